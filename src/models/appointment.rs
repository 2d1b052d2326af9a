use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// A row of the `citas` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Appointment enriched with denormalized display names, the outbound
/// shape of every successful read or mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
    pub specialty_name: String,
}

/// Request to book an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// When supplied, must match the doctor's own specialty.
    pub specialty_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: String,
    pub notes: Option<String>,
}

/// Partial update. `None` fields are left untouched. Status is not here:
/// status only changes through the lifecycle path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub reason: Option<String>,
    /// Outer `None` leaves the notes alone; `Some(None)` clears them.
    pub notes: Option<Option<String>>,
}

impl AppointmentUpdate {
    /// True when the patch only touches fields a patient may edit.
    pub fn is_reason_notes_only(&self) -> bool {
        self.date.is_none() && self.time.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.reason.is_none() && self.notes.is_none()
    }
}

/// Per-status / per-doctor / per-specialty appointment counts (admin report).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub by_status: Vec<(AppointmentStatus, i64)>,
    pub by_doctor: Vec<(String, i64)>,
    pub by_specialty: Vec<(String, i64)>,
}
