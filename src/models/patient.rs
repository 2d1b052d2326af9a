use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Partial patient update. The document identity is immutable; a changed
/// document means a different person.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Outer `None` leaves the phone alone; `Some(None)` clears it.
    pub phone: Option<Option<String>>,
}
