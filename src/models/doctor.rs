use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty_id: Uuid,
    pub license_number: Option<String>,
    /// Working-hours window, start inclusive / end exclusive.
    pub hours_start: NaiveTime,
    pub hours_end: NaiveTime,
    pub active: bool,
}

/// Doctor joined with specialty name for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDetails {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub specialty_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialty_id: Uuid,
    pub license_number: Option<String>,
    pub hours_start: NaiveTime,
    pub hours_end: NaiveTime,
}

/// Partial doctor update. Specialty is immutable once assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorUpdate {
    pub name: Option<String>,
    /// Outer `None` leaves the license alone; `Some(None)` clears it.
    pub license_number: Option<Option<String>>,
    pub hours_start: Option<NaiveTime>,
    pub hours_end: Option<NaiveTime>,
}
