use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{DocumentType, NewPatient, Patient, PatientUpdate};

pub fn create(conn: &Connection, new: &NewPatient) -> Result<Patient, SchedulingError> {
    validate(new)?;

    // Friendly duplicate messages before the unique indexes fire.
    if find_by_document(conn, new.document_type, &new.document_number)?.is_some() {
        return Err(SchedulingError::Conflict(format!(
            "a patient with document {} {} already exists",
            new.document_type.as_str(),
            new.document_number
        )));
    }
    if email_taken(conn, &new.email, None)? {
        return Err(SchedulingError::Conflict(format!(
            "email {} is already registered",
            new.email
        )));
    }

    let patient = Patient {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        document_type: new.document_type,
        document_number: new.document_number.trim().to_string(),
        email: new.email.trim().to_string(),
        phone: new.phone.clone(),
        active: true,
    };

    conn.execute(
        "INSERT INTO pacientes (id, nombre, tipo_documento, documento, email, telefono, activo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.document_type.as_str(),
            patient.document_number,
            patient.email,
            patient.phone,
        ],
    )?;

    info!(patient_id = %patient.id, "patient registered");
    Ok(patient)
}

fn validate(new: &NewPatient) -> Result<(), SchedulingError> {
    if new.name.trim().is_empty() {
        return Err(SchedulingError::Validation("patient name is required".into()));
    }
    if new.document_number.trim().is_empty() {
        return Err(SchedulingError::Validation("document number is required".into()));
    }
    let email = new.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(SchedulingError::Validation("a valid email is required".into()));
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Patient>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, tipo_documento, documento, email, telefono, activo
             FROM pacientes WHERE id = ?1",
            params![id.to_string()],
            map_patient,
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

pub fn find_by_document(
    conn: &Connection,
    document_type: DocumentType,
    document_number: &str,
) -> Result<Option<Patient>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, tipo_documento, documento, email, telefono, activo
             FROM pacientes WHERE tipo_documento = ?1 AND documento = ?2",
            params![document_type.as_str(), document_number.trim()],
            map_patient,
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

fn email_taken(
    conn: &Connection,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<bool, SchedulingError> {
    let count: i64 = match exclude {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM pacientes WHERE email = ?1 AND id != ?2",
            params![email.trim(), id.to_string()],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COUNT(*) FROM pacientes WHERE email = ?1",
            params![email.trim()],
            |row| row.get(0),
        ),
    }
    .map_err(crate::db::DatabaseError::from)?;
    Ok(count > 0)
}

/// Updates contact details. The document identity never changes here.
pub fn update(conn: &Connection, id: Uuid, patch: &PatientUpdate) -> Result<Patient, SchedulingError> {
    let existing = get(conn, id)?.ok_or_else(|| SchedulingError::not_found("Patient", id))?;

    let name = patch.name.as_deref().map(str::trim).unwrap_or(&existing.name);
    if name.is_empty() {
        return Err(SchedulingError::Validation("patient name is required".into()));
    }
    let email = patch.email.as_deref().map(str::trim).unwrap_or(&existing.email);
    if email.is_empty() || !email.contains('@') {
        return Err(SchedulingError::Validation("a valid email is required".into()));
    }
    if email != existing.email && email_taken(conn, email, Some(id))? {
        return Err(SchedulingError::Conflict(format!(
            "email {email} is already registered"
        )));
    }
    let phone = match &patch.phone {
        None => existing.phone.as_deref(),
        Some(phone) => phone.as_deref(),
    };

    conn.execute(
        "UPDATE pacientes SET nombre = ?1, email = ?2, telefono = ?3 WHERE id = ?4",
        params![name, email, phone, id.to_string()],
    )?;

    get(conn, id)?.ok_or_else(|| SchedulingError::not_found("Patient", id))
}

/// Active patients ordered by name.
pub fn list_active(conn: &Connection) -> Result<Vec<Patient>, SchedulingError> {
    let mut stmt = conn.prepare(
        "SELECT id, nombre, tipo_documento, documento, email, telefono, activo
         FROM pacientes WHERE activo = 1 ORDER BY nombre ASC",
    )?;
    let rows = stmt.query_map([], map_patient)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SchedulingError::from)
}

/// Whether the patient still has appointments in `programada` state, the
/// guard applied before a patient record may be deleted.
pub fn has_scheduled_appointments(conn: &Connection, id: Uuid) -> Result<bool, SchedulingError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM citas WHERE paciente_id = ?1 AND estado = 'programada'",
            params![id.to_string()],
            |row| row.get(0),
        )
        .map_err(crate::db::DatabaseError::from)?;
    Ok(count > 0)
}

/// Hard-deletes a patient record. Refused while scheduled appointments exist.
pub fn delete(conn: &Connection, id: Uuid) -> Result<(), SchedulingError> {
    if has_scheduled_appointments(conn, id)? {
        return Err(SchedulingError::Conflict(
            "cannot delete a patient with scheduled appointments".into(),
        ));
    }
    let changed = conn.execute(
        "DELETE FROM pacientes WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(SchedulingError::not_found("Patient", id));
    }
    info!(patient_id = %id, "patient deleted");
    Ok(())
}

fn map_patient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    use std::str::FromStr;
    let type_str: String = row.get(2)?;
    Ok(Patient {
        id: super::uuid_at(row, 0)?,
        name: row.get(1)?,
        document_type: DocumentType::from_str(&type_str).unwrap_or(DocumentType::Other),
        document_number: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        active: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::seed_clinic;
    use crate::db::sqlite::open_memory_database;

    fn new_patient() -> NewPatient {
        NewPatient {
            name: "Carmen Díaz".into(),
            document_type: DocumentType::NationalId,
            document_number: "70331245".into(),
            email: "carmen.diaz@example.com".into(),
            phone: Some("988776655".into()),
        }
    }

    #[test]
    fn register_and_fetch() {
        let conn = open_memory_database().unwrap();
        let created = create(&conn, &new_patient()).unwrap();
        assert!(created.active);

        let fetched = get(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Carmen Díaz");
        assert_eq!(fetched.document_type, DocumentType::NationalId);
        assert_eq!(fetched.email, "carmen.diaz@example.com");
    }

    #[test]
    fn duplicate_document_is_conflict() {
        let conn = open_memory_database().unwrap();
        create(&conn, &new_patient()).unwrap();

        let mut dup = new_patient();
        dup.email = "otra@example.com".into();
        let err = create(&conn, &dup).unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict(_)));

        // Same number, different document type is a different person.
        dup.document_type = DocumentType::Passport;
        create(&conn, &dup).unwrap();
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let conn = open_memory_database().unwrap();
        create(&conn, &new_patient()).unwrap();

        let mut dup = new_patient();
        dup.document_number = "99887766".into();
        let err = create(&conn, &dup).unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict(_)));
    }

    #[test]
    fn malformed_email_is_rejected() {
        let conn = open_memory_database().unwrap();
        let mut bad = new_patient();
        bad.email = "sin-arroba".into();
        let err = create(&conn, &bad).unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }

    #[test]
    fn find_by_document_matches_type_and_number() {
        let conn = open_memory_database().unwrap();
        let created = create(&conn, &new_patient()).unwrap();

        let found = find_by_document(&conn, DocumentType::NationalId, "70331245")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(find_by_document(&conn, DocumentType::Passport, "70331245")
            .unwrap()
            .is_none());
    }

    #[test]
    fn update_changes_contact_details_only() {
        let conn = open_memory_database().unwrap();
        let created = create(&conn, &new_patient()).unwrap();

        let updated = update(
            &conn,
            created.id,
            &PatientUpdate {
                email: Some("c.diaz@example.com".into()),
                phone: Some(Some("911222333".into())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.email, "c.diaz@example.com");
        assert_eq!(updated.phone.as_deref(), Some("911222333"));
        assert_eq!(updated.name, "Carmen Díaz");
        assert_eq!(updated.document_number, "70331245");
    }

    #[test]
    fn update_clears_phone_with_an_explicit_null() {
        let conn = open_memory_database().unwrap();
        let created = create(&conn, &new_patient()).unwrap();

        let cleared = update(
            &conn,
            created.id,
            &PatientUpdate {
                phone: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.phone, None);
    }

    #[test]
    fn corrupt_stored_id_is_a_storage_error() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO pacientes (id, nombre, tipo_documento, documento, email, activo)
             VALUES ('not-a-uuid', 'Fila Rota', 'dni', '00000000', 'rota@example.com', 1)",
            [],
        )
        .unwrap();

        let err = list_active(&conn).unwrap_err();
        assert!(matches!(err, SchedulingError::Storage(_)));
    }

    #[test]
    fn update_to_a_taken_email_is_conflict() {
        let conn = open_memory_database().unwrap();
        let created = create(&conn, &new_patient()).unwrap();
        let mut other = new_patient();
        other.document_number = "11223344".into();
        other.email = "otra@example.com".into();
        let other = create(&conn, &other).unwrap();

        let err = update(
            &conn,
            other.id,
            &PatientUpdate {
                email: Some(created.email.clone()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict(_)));
    }

    #[test]
    fn delete_refused_while_scheduled_appointments_exist() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);
        conn.execute(
            "INSERT INTO citas (id, paciente_id, medico_id, fecha, hora, motivo,
                                estado, fecha_creacion, fecha_actualizacion)
             VALUES (?1, ?2, ?3, '2025-10-01', '10:00:00', 'control',
                     'programada', '2025-09-01T00:00:00', '2025-09-01T00:00:00')",
            params![
                uuid::Uuid::new_v4().to_string(),
                clinic.patient_id.to_string(),
                clinic.doctor_id.to_string(),
            ],
        )
        .unwrap();

        let err = delete(&conn, clinic.patient_id).unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict(_)));

        // Only 'programada' blocks; the FK still needs the history cleared.
        conn.execute("DELETE FROM citas", []).unwrap();
        delete(&conn, clinic.patient_id).unwrap();
        assert!(get(&conn, clinic.patient_id).unwrap().is_none());
    }

    #[test]
    fn deleting_a_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = delete(&conn, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn listing_skips_inactive_patients() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);
        conn.execute(
            "UPDATE pacientes SET activo = 0 WHERE id = ?1",
            params![clinic.patient2_id.to_string()],
        )
        .unwrap();

        let active = list_active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, clinic.patient_id);
    }
}
