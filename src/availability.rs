//! Slot availability.
//!
//! Pure reads over `citas`: nothing here persists. A slot is taken when an
//! appointment in the active set ({scheduled, confirmed}) already holds the
//! same (doctor, date, time). The partial unique index `idx_citas_slot_activa`
//! enforces the same rule at the store level, so a concurrent booking that
//! slips past these checks still fails with a conflict on insert.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::doctor;
use crate::error::SchedulingError;
use crate::models::Doctor;

/// Slot grid used by [`list_available_slots`]. Direct booking accepts
/// arbitrary-minute times inside the working window.
pub const SLOT_MINUTES: i64 = 30;

/// Whether (doctor, date, time) is free of active appointments.
///
/// `exclude` skips one appointment id, for re-checks while updating that
/// same appointment. An unknown doctor id is an error, not "unavailable":
/// callers must be able to tell a missing doctor from a booked slot.
pub fn is_available(
    conn: &Connection,
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<Uuid>,
) -> Result<bool, SchedulingError> {
    doctor::get(conn, doctor_id)?
        .ok_or_else(|| SchedulingError::not_found("Doctor", doctor_id))?;

    let count: i64 = match exclude {
        Some(excluded_id) => conn.query_row(
            "SELECT COUNT(*) FROM citas
             WHERE medico_id = ?1 AND fecha = ?2 AND hora = ?3
               AND estado IN ('programada', 'confirmada')
               AND id != ?4",
            params![doctor_id.to_string(), date, time, excluded_id.to_string()],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COUNT(*) FROM citas
             WHERE medico_id = ?1 AND fecha = ?2 AND hora = ?3
               AND estado IN ('programada', 'confirmada')",
            params![doctor_id.to_string(), date, time],
            |row| row.get(0),
        ),
    }
    .map_err(crate::db::DatabaseError::from)?;

    Ok(count == 0)
}

/// Whether the time falls inside the doctor's working window
/// (start inclusive, end exclusive).
pub fn within_working_hours(doctor: &Doctor, time: NaiveTime) -> bool {
    time >= doctor.hours_start && time < doctor.hours_end
}

/// Free 30-minute slots for the doctor on the given date, ordered ascending.
///
/// Generated from the working-hours window, minus slots already held by an
/// active appointment. Concurrent bookings during generation are not
/// protected; the slot index catches them at insert time.
pub fn list_available_slots(
    conn: &Connection,
    doctor_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<NaiveTime>, SchedulingError> {
    let doctor = doctor::get(conn, doctor_id)?
        .ok_or_else(|| SchedulingError::not_found("Doctor", doctor_id))?;

    let booked = booked_times(conn, doctor_id, date)?;

    let mut slots = Vec::new();
    let mut current = doctor.hours_start;
    while current < doctor.hours_end {
        if !booked.contains(&current) {
            slots.push(current);
        }
        match current.overflowing_add_signed(Duration::minutes(SLOT_MINUTES)) {
            // overflow wrapped past midnight; the window is done
            (next, 0) => current = next,
            _ => break,
        }
    }

    Ok(slots)
}

/// Times on the given date already held by an active appointment.
fn booked_times(
    conn: &Connection,
    doctor_id: Uuid,
    date: NaiveDate,
) -> Result<HashSet<NaiveTime>, SchedulingError> {
    let mut stmt = conn
        .prepare(
            "SELECT hora FROM citas
             WHERE medico_id = ?1 AND fecha = ?2
               AND estado IN ('programada', 'confirmada')",
        )
        .map_err(crate::db::DatabaseError::from)?;

    let rows = stmt
        .query_map(params![doctor_id.to_string(), date], |row| {
            row.get::<_, NaiveTime>(0)
        })
        .map_err(crate::db::DatabaseError::from)?;

    let mut times = HashSet::new();
    for row in rows {
        times.insert(row.map_err(crate::db::DatabaseError::from)?);
    }
    Ok(times)
}
