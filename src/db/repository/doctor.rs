use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Doctor, DoctorDetails, DoctorUpdate, NewDoctor};

pub fn create(conn: &Connection, new: &NewDoctor) -> Result<DoctorDetails, SchedulingError> {
    if new.name.trim().is_empty() {
        return Err(SchedulingError::Validation("doctor name is required".into()));
    }
    if new.hours_start >= new.hours_end {
        return Err(SchedulingError::Validation(
            "working hours start must be before end".into(),
        ));
    }

    let specialty = super::specialty::get(conn, new.specialty_id)?
        .ok_or_else(|| SchedulingError::not_found("Specialty", new.specialty_id))?;

    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        specialty_id: new.specialty_id,
        license_number: new.license_number.clone(),
        hours_start: new.hours_start,
        hours_end: new.hours_end,
        active: true,
    };

    conn.execute(
        "INSERT INTO medicos (id, nombre, especialidad_id, numero_licencia,
                              horario_inicio, horario_fin, activo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
        params![
            doctor.id.to_string(),
            doctor.name,
            doctor.specialty_id.to_string(),
            doctor.license_number,
            doctor.hours_start,
            doctor.hours_end,
        ],
    )?;

    info!(doctor_id = %doctor.id, specialty = %specialty.name, "doctor registered");
    Ok(DoctorDetails {
        doctor,
        specialty_name: specialty.name,
    })
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, especialidad_id, numero_licencia,
                    horario_inicio, horario_fin, activo
             FROM medicos WHERE id = ?1",
            params![id.to_string()],
            map_doctor,
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

pub fn get_details(conn: &Connection, id: Uuid) -> Result<Option<DoctorDetails>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT m.id, m.nombre, m.especialidad_id, m.numero_licencia,
                    m.horario_inicio, m.horario_fin, m.activo, e.nombre
             FROM medicos m
             JOIN especialidades e ON m.especialidad_id = e.id
             WHERE m.id = ?1",
            params![id.to_string()],
            |row| {
                Ok(DoctorDetails {
                    doctor: map_doctor(row)?,
                    specialty_name: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

/// Active doctors with specialty names, ordered by name.
pub fn list_active(conn: &Connection) -> Result<Vec<DoctorDetails>, SchedulingError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.nombre, m.especialidad_id, m.numero_licencia,
                m.horario_inicio, m.horario_fin, m.activo, e.nombre
         FROM medicos m
         JOIN especialidades e ON m.especialidad_id = e.id
         WHERE m.activo = 1
         ORDER BY m.nombre ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DoctorDetails {
            doctor: map_doctor(row)?,
            specialty_name: row.get(7)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SchedulingError::from)
}

/// Updates name, license, or the working-hours window. Specialty is fixed.
/// A new window applies to future availability checks only; existing
/// appointments are not revalidated.
pub fn update(conn: &Connection, id: Uuid, patch: &DoctorUpdate) -> Result<DoctorDetails, SchedulingError> {
    let existing = get(conn, id)?.ok_or_else(|| SchedulingError::not_found("Doctor", id))?;

    let name = patch.name.as_deref().map(str::trim).unwrap_or(&existing.name);
    if name.is_empty() {
        return Err(SchedulingError::Validation("doctor name is required".into()));
    }
    let hours_start: NaiveTime = patch.hours_start.unwrap_or(existing.hours_start);
    let hours_end: NaiveTime = patch.hours_end.unwrap_or(existing.hours_end);
    if hours_start >= hours_end {
        return Err(SchedulingError::Validation(
            "working hours start must be before end".into(),
        ));
    }
    let license = match &patch.license_number {
        None => existing.license_number.as_deref(),
        Some(license) => license.as_deref(),
    };

    conn.execute(
        "UPDATE medicos
         SET nombre = ?1, numero_licencia = ?2, horario_inicio = ?3, horario_fin = ?4
         WHERE id = ?5",
        params![name, license, hours_start, hours_end, id.to_string()],
    )?;

    get_details(conn, id)?.ok_or_else(|| SchedulingError::not_found("Doctor", id))
}

/// Marks a doctor inactive. Existing appointments are untouched; the doctor
/// stops appearing in listings and cannot receive new bookings.
pub fn deactivate(conn: &Connection, id: Uuid) -> Result<(), SchedulingError> {
    let changed = conn.execute(
        "UPDATE medicos SET activo = 0 WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(SchedulingError::not_found("Doctor", id));
    }
    info!(doctor_id = %id, "doctor deactivated");
    Ok(())
}

fn map_doctor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: super::uuid_at(row, 0)?,
        name: row.get(1)?,
        specialty_id: super::uuid_at(row, 2)?,
        license_number: row.get(3)?,
        hours_start: row.get(4)?,
        hours_end: row.get(5)?,
        active: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::seed_clinic;
    use crate::db::sqlite::open_memory_database;

    fn hhmm(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn register_and_fetch_with_specialty_name() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);

        let created = create(
            &conn,
            &NewDoctor {
                name: "Dr. Iván Paredes".into(),
                specialty_id: clinic.specialty_id,
                license_number: Some("CMP-60412".into()),
                hours_start: hhmm("14:00"),
                hours_end: hhmm("20:00"),
            },
        )
        .unwrap();
        assert_eq!(created.specialty_name, "Cardiología");

        let details = get_details(&conn, created.doctor.id).unwrap().unwrap();
        assert_eq!(details.doctor.hours_start, hhmm("14:00"));
        assert_eq!(details.doctor.hours_end, hhmm("20:00"));
        assert!(details.doctor.active);
    }

    #[test]
    fn unknown_specialty_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = create(
            &conn,
            &NewDoctor {
                name: "Dr. Nadie".into(),
                specialty_id: Uuid::new_v4(),
                license_number: None,
                hours_start: hhmm("08:00"),
                hours_end: hhmm("16:00"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn inverted_working_hours_are_rejected() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);
        let err = create(
            &conn,
            &NewDoctor {
                name: "Dr. Reloj".into(),
                specialty_id: clinic.specialty_id,
                license_number: None,
                hours_start: hhmm("16:00"),
                hours_end: hhmm("08:00"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));

        // Shrinking only the end below the existing start is just as bad.
        let err = update(
            &conn,
            clinic.doctor_id,
            &DoctorUpdate {
                hours_end: Some(hhmm("06:00")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchedulingError::Validation(_)));
    }

    #[test]
    fn update_round_trips_and_keeps_untouched_fields() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);

        let updated = update(
            &conn,
            clinic.doctor_id,
            &DoctorUpdate {
                hours_start: Some(hhmm("07:30")),
                hours_end: Some(hhmm("15:30")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.doctor.hours_start, hhmm("07:30"));
        assert_eq!(updated.doctor.hours_end, hhmm("15:30"));
        assert_eq!(updated.doctor.name, "Dra. Elena García");
        assert_eq!(updated.doctor.license_number.as_deref(), Some("CMP-44821"));

        // An explicit null clears the license.
        let cleared = update(
            &conn,
            clinic.doctor_id,
            &DoctorUpdate {
                license_number: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cleared.doctor.license_number, None);
    }

    #[test]
    fn deactivation_hides_the_doctor_from_listings() {
        let conn = open_memory_database().unwrap();
        let clinic = seed_clinic(&conn);

        deactivate(&conn, clinic.doctor2_id).unwrap();
        let active = list_active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].doctor.id, clinic.doctor_id);

        // The record itself survives for existing appointments.
        assert!(get(&conn, clinic.doctor2_id).unwrap().is_some());
    }

    #[test]
    fn deactivating_a_missing_doctor_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = deactivate(&conn, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }
}
