//! Appointment (cita) persistence. Sole owner of writes to `citas`.
//!
//! The availability checker and lifecycle module only decide; every decision
//! is applied here, inside a transaction where a check precedes a write.
//! Whatever slips between check and commit is caught by the partial unique
//! slot index and surfaces as a Conflict.

use std::str::FromStr;

use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::authorization::{self, Operation};
use crate::availability;
use crate::error::SchedulingError;
use crate::models::{
    Actor, Appointment, AppointmentDetails, AppointmentFilter, AppointmentStats,
    AppointmentStatus, AppointmentUpdate, NewAppointment, Page, Role,
};

const DETAILS_SELECT: &str = "SELECT c.id, c.paciente_id, c.medico_id, c.fecha, c.hora,
        c.motivo, c.notas, c.estado, c.fecha_creacion, c.fecha_actualizacion,
        p.nombre, m.nombre, e.nombre
 FROM citas c
 JOIN pacientes p ON c.paciente_id = p.id
 JOIN medicos m ON c.medico_id = m.id
 JOIN especialidades e ON m.especialidad_id = e.id";

/// Books an appointment in state `programada`.
///
/// Validates references (patient/doctor exist and are active, declared
/// specialty matches the doctor's), the working-hours window, and slot
/// availability, then inserts atomically. A concurrent booking of the same
/// slot loses on the unique index and gets the same `Conflict`.
pub fn create(
    conn: &Connection,
    actor: &Actor,
    new: &NewAppointment,
) -> Result<AppointmentDetails, SchedulingError> {
    if new.reason.trim().is_empty() {
        return Err(SchedulingError::Validation("appointment reason is required".into()));
    }

    if !authorization::can_create(actor, new.patient_id) {
        return Err(SchedulingError::Forbidden(
            "patients may only book appointments for themselves".into(),
        ));
    }

    let patient = super::patient::get(conn, new.patient_id)?
        .ok_or_else(|| SchedulingError::not_found("Patient", new.patient_id))?;
    if !patient.active {
        return Err(SchedulingError::Validation("patient is inactive".into()));
    }

    let doctor = super::doctor::get(conn, new.doctor_id)?
        .ok_or_else(|| SchedulingError::not_found("Doctor", new.doctor_id))?;
    if !doctor.active {
        return Err(SchedulingError::Validation("doctor is inactive".into()));
    }

    if let Some(specialty_id) = new.specialty_id {
        if specialty_id != doctor.specialty_id {
            return Err(SchedulingError::Validation(
                "doctor does not belong to the requested specialty".into(),
            ));
        }
    }

    if !availability::within_working_hours(&doctor, new.time) {
        return Err(SchedulingError::Validation(
            "requested time is outside the doctor's working hours".into(),
        ));
    }

    let tx = conn.unchecked_transaction().map_err(crate::db::DatabaseError::from)?;

    if !availability::is_available(&tx, new.doctor_id, new.date, new.time, None)? {
        return Err(slot_conflict());
    }

    let id = Uuid::new_v4();
    let now = Local::now().naive_local();
    tx.execute(
        "INSERT INTO citas (id, paciente_id, medico_id, fecha, hora, motivo, notas,
                            estado, fecha_creacion, fecha_actualizacion)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'programada', ?8, ?8)",
        params![
            id.to_string(),
            new.patient_id.to_string(),
            new.doctor_id.to_string(),
            new.date,
            new.time,
            new.reason.trim(),
            new.notes,
            now,
        ],
    )
    .map_err(map_slot_constraint)?;
    tx.commit().map_err(crate::db::DatabaseError::from)?;

    info!(
        appointment_id = %id,
        doctor_id = %new.doctor_id,
        date = %new.date,
        time = %new.time,
        "appointment booked"
    );
    get_details(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))
}

/// Updates non-status fields.
///
/// Patients may only touch reason/notes; a patch carrying anything else is
/// refused outright rather than silently stripped. Date/time changes re-run
/// the availability check excluding this appointment.
pub fn update(
    conn: &Connection,
    actor: &Actor,
    id: Uuid,
    patch: &AppointmentUpdate,
) -> Result<AppointmentDetails, SchedulingError> {
    if patch.is_empty() {
        return Err(SchedulingError::Validation("no fields to update".into()));
    }

    let existing =
        get_row(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))?;

    if !authorization::can_mutate(actor, &existing, Operation::Update) {
        return Err(SchedulingError::Forbidden(
            "you may not modify this appointment".into(),
        ));
    }
    if actor.role == Role::Patient && !patch.is_reason_notes_only() {
        return Err(SchedulingError::Forbidden(
            "patients may only change the reason or notes".into(),
        ));
    }

    if let Some(reason) = &patch.reason {
        if reason.trim().is_empty() {
            return Err(SchedulingError::Validation("appointment reason is required".into()));
        }
    }

    let date = patch.date.unwrap_or(existing.date);
    let time = patch.time.unwrap_or(existing.time);
    let slot_changed = date != existing.date || time != existing.time;

    let tx = conn.unchecked_transaction().map_err(crate::db::DatabaseError::from)?;

    if slot_changed {
        let doctor = super::doctor::get(&tx, existing.doctor_id)?
            .ok_or_else(|| SchedulingError::not_found("Doctor", existing.doctor_id))?;
        if !availability::within_working_hours(&doctor, time) {
            return Err(SchedulingError::Validation(
                "requested time is outside the doctor's working hours".into(),
            ));
        }
        if !availability::is_available(&tx, existing.doctor_id, date, time, Some(id))? {
            return Err(slot_conflict());
        }
    }

    let reason = patch
        .reason
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.reason);
    let notes = match &patch.notes {
        None => existing.notes.as_deref(),
        Some(notes) => notes.as_deref(),
    };
    let now = Local::now().naive_local();

    tx.execute(
        "UPDATE citas
         SET fecha = ?1, hora = ?2, motivo = ?3, notas = ?4, fecha_actualizacion = ?5
         WHERE id = ?6",
        params![date, time, reason, notes, now, id.to_string()],
    )
    .map_err(map_slot_constraint)?;
    tx.commit().map_err(crate::db::DatabaseError::from)?;

    debug!(appointment_id = %id, slot_changed, "appointment updated");
    get_details(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))
}

/// Applies a status transition. The only path that writes `estado`.
pub fn change_status(
    conn: &Connection,
    actor: &Actor,
    id: Uuid,
    target: AppointmentStatus,
    notes: Option<&str>,
) -> Result<AppointmentDetails, SchedulingError> {
    let tx = conn.unchecked_transaction().map_err(crate::db::DatabaseError::from)?;

    let existing =
        get_row(&tx, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))?;

    crate::lifecycle::authorize_transition(&existing, target, actor)?;

    let now = Local::now().naive_local();
    match notes {
        Some(notes) => tx.execute(
            "UPDATE citas SET estado = ?1, notas = ?2, fecha_actualizacion = ?3 WHERE id = ?4",
            params![target.as_str(), notes, now, id.to_string()],
        ),
        None => tx.execute(
            "UPDATE citas SET estado = ?1, fecha_actualizacion = ?2 WHERE id = ?3",
            params![target.as_str(), now, id.to_string()],
        ),
    }
    .map_err(crate::db::DatabaseError::from)?;
    tx.commit().map_err(crate::db::DatabaseError::from)?;

    info!(
        appointment_id = %id,
        from = existing.status.as_str(),
        to = target.as_str(),
        "appointment status changed"
    );
    get_details(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))
}

/// Hard-deletes an appointment. Admin only; there is no soft delete.
pub fn delete(conn: &Connection, actor: &Actor, id: Uuid) -> Result<(), SchedulingError> {
    let existing =
        get_row(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))?;

    if !authorization::can_mutate(actor, &existing, Operation::Delete) {
        return Err(SchedulingError::Forbidden(
            "only administrators may delete appointments".into(),
        ));
    }

    conn.execute("DELETE FROM citas WHERE id = ?1", params![id.to_string()])
        .map_err(crate::db::DatabaseError::from)?;
    info!(appointment_id = %id, "appointment deleted");
    Ok(())
}

/// Fetches one appointment with display names, enforcing visibility.
pub fn get(
    conn: &Connection,
    actor: &Actor,
    id: Uuid,
) -> Result<AppointmentDetails, SchedulingError> {
    let details =
        get_details(conn, id)?.ok_or_else(|| SchedulingError::not_found("Appointment", id))?;
    if !authorization::can_view(actor, &details.appointment) {
        return Err(SchedulingError::Forbidden(
            "you may not view this appointment".into(),
        ));
    }
    Ok(details)
}

/// Lists appointments under the actor's role scope, newest slot first.
pub fn list(
    conn: &Connection,
    actor: &Actor,
    filter: &AppointmentFilter,
    page: Page,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let scoped = authorization::scope_filters(actor, filter.clone());
    let (where_sql, params) = build_where(&scoped);
    let sql = format!(
        "{DETAILS_SELECT}{where_sql} ORDER BY c.fecha DESC, c.hora DESC LIMIT {} OFFSET {}",
        page.per_page,
        page.offset()
    );
    query_details(conn, &sql, &params)
}

/// Number of appointments matching the scoped filters.
pub fn count(
    conn: &Connection,
    actor: &Actor,
    filter: &AppointmentFilter,
) -> Result<i64, SchedulingError> {
    let scoped = authorization::scope_filters(actor, filter.clone());
    let (where_sql, params) = build_where(&scoped);
    let sql = format!(
        "SELECT COUNT(*) FROM citas c
         JOIN medicos m ON c.medico_id = m.id{where_sql}"
    );
    let count = conn
        .query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| row.get(0))
        .map_err(crate::db::DatabaseError::from)?;
    Ok(count)
}

/// The day's agenda under the actor's scope, earliest first.
pub fn list_for_day(
    conn: &Connection,
    actor: &Actor,
    date: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let scoped = authorization::scope_filters(
        actor,
        AppointmentFilter {
            date: Some(date),
            ..Default::default()
        },
    );
    let (where_sql, params) = build_where(&scoped);
    let sql = format!("{DETAILS_SELECT}{where_sql} ORDER BY c.hora ASC");
    query_details(conn, &sql, &params)
}

/// A patient's next appointments: future, still active, soonest first.
/// Scoped like every other read: patients are pinned to themselves and
/// doctors only see the slice they are the assigned doctor for.
pub fn upcoming_for_patient(
    conn: &Connection,
    actor: &Actor,
    patient_id: Uuid,
    limit: u32,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let scoped = authorization::scope_filters(
        actor,
        AppointmentFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        },
    );
    let (where_sql, mut params) = build_where(&scoped);
    params.push(Local::now().date_naive().to_string());
    let sql = format!(
        "{DETAILS_SELECT}{where_sql}
           AND c.fecha >= ? AND c.estado IN ('programada', 'confirmada')
         ORDER BY c.fecha ASC, c.hora ASC LIMIT {}",
        limit.clamp(1, 100)
    );
    query_details(conn, &sql, &params)
}

/// Appointment counts by status, doctor, and specialty. Admin report.
pub fn stats(
    conn: &Connection,
    actor: &Actor,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<AppointmentStats, SchedulingError> {
    if !actor.is_admin() {
        return Err(SchedulingError::Forbidden(
            "only administrators may view appointment statistics".into(),
        ));
    }

    let (range_sql, params) = match (from, to) {
        (Some(from), Some(to)) => (
            " WHERE c.fecha BETWEEN ?1 AND ?2",
            vec![from.to_string(), to.to_string()],
        ),
        _ => ("", Vec::new()),
    };

    let by_status = {
        let sql = format!(
            "SELECT c.estado, COUNT(*) FROM citas c{range_sql} GROUP BY c.estado ORDER BY c.estado"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (status, count) = row.map_err(crate::db::DatabaseError::from)?;
            out.push((
                AppointmentStatus::from_str(&status).map_err(SchedulingError::from)?,
                count,
            ));
        }
        out
    };

    let by_doctor = count_grouped(
        conn,
        &format!(
            "SELECT m.nombre, COUNT(*) FROM citas c
             JOIN medicos m ON c.medico_id = m.id{range_sql}
             GROUP BY c.medico_id ORDER BY COUNT(*) DESC"
        ),
        &params,
    )?;

    let by_specialty = count_grouped(
        conn,
        &format!(
            "SELECT e.nombre, COUNT(*) FROM citas c
             JOIN medicos m ON c.medico_id = m.id
             JOIN especialidades e ON m.especialidad_id = e.id{range_sql}
             GROUP BY e.id ORDER BY COUNT(*) DESC"
        ),
        &params,
    )?;

    Ok(AppointmentStats {
        by_status,
        by_doctor,
        by_specialty,
    })
}

// ─── Internals ────────────────────────────────────────────────────────────────

fn slot_conflict() -> SchedulingError {
    SchedulingError::Conflict("the doctor is not available at that date and time".into())
}

/// The unique slot index is the canonical double-booking signal.
fn map_slot_constraint(err: rusqlite::Error) -> SchedulingError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return slot_conflict();
        }
    }
    err.into()
}

fn build_where(filter: &AppointmentFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(patient_id) = filter.patient_id {
        clauses.push("c.paciente_id = ?");
        params.push(patient_id.to_string());
    }
    if let Some(doctor_id) = filter.doctor_id {
        clauses.push("c.medico_id = ?");
        params.push(doctor_id.to_string());
    }
    if let Some(specialty_id) = filter.specialty_id {
        clauses.push("m.especialidad_id = ?");
        params.push(specialty_id.to_string());
    }
    if let Some(status) = filter.status {
        clauses.push("c.estado = ?");
        params.push(status.as_str().to_string());
    }
    if let Some(date) = filter.date {
        clauses.push("c.fecha = ?");
        params.push(date.to_string());
    }
    if let Some(from) = filter.date_from {
        clauses.push("c.fecha >= ?");
        params.push(from.to_string());
    }
    if let Some(to) = filter.date_to {
        clauses.push("c.fecha <= ?");
        params.push(to.to_string());
    }

    if clauses.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

fn query_details(
    conn: &Connection,
    sql: &str,
    params: &[String],
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), map_details)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SchedulingError::from)
}

fn count_grouped(
    conn: &Connection,
    sql: &str,
    params: &[String],
) -> Result<Vec<(String, i64)>, SchedulingError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SchedulingError::from)
}

fn get_row(conn: &Connection, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
    let row = conn
        .query_row(
            "SELECT id, paciente_id, medico_id, fecha, hora, motivo, notas, estado,
                    fecha_creacion, fecha_actualizacion
             FROM citas WHERE id = ?1",
            params![id.to_string()],
            map_appointment,
        )
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

fn get_details(conn: &Connection, id: Uuid) -> Result<Option<AppointmentDetails>, SchedulingError> {
    let sql = format!("{DETAILS_SELECT} WHERE c.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], map_details)
        .optional()
        .map_err(crate::db::DatabaseError::from)?;
    Ok(row)
}

fn map_appointment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Appointment> {
    let status_str: String = row.get(7)?;
    let status = AppointmentStatus::from_str(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Appointment {
        id: super::uuid_at(row, 0)?,
        patient_id: super::uuid_at(row, 1)?,
        doctor_id: super::uuid_at(row, 2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        reason: row.get(5)?,
        notes: row.get(6)?,
        status,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn map_details(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentDetails> {
    Ok(AppointmentDetails {
        appointment: map_appointment(row)?,
        patient_name: row.get(10)?,
        doctor_name: row.get(11)?,
        specialty_name: row.get(12)?,
    })
}
