//! Domain error taxonomy.
//!
//! Every failing operation returns one of these kinds plus a human-readable
//! message. The transport collaborator maps [`SchedulingError::status_code`]
//! to an HTTP status. Storage failures stay opaque to callers; the detail
//! goes to the log.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::AppointmentStatus;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal storage error")]
    Storage(#[source] DatabaseError),
}

impl SchedulingError {
    /// HTTP-status-like severity for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Forbidden(_) => 403,
            Self::InvalidTransition { .. } => 409,
            Self::Validation(_) => 400,
            Self::Storage(_) => 500,
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            other if other.is_constraint_violation() => {
                Self::Conflict("the record conflicts with an existing one".into())
            }
            other => {
                tracing::error!("storage failure: {other}");
                Self::Storage(other)
            }
        }
    }
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            SchedulingError::not_found("Appointment", "x").status_code(),
            404
        );
        assert_eq!(SchedulingError::Conflict("slot taken".into()).status_code(), 409);
        assert_eq!(SchedulingError::Forbidden("not yours".into()).status_code(), 403);
        assert_eq!(
            SchedulingError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Scheduled,
            }
            .status_code(),
            409
        );
        assert_eq!(SchedulingError::Validation("missing".into()).status_code(), 400);
    }

    #[test]
    fn storage_error_is_opaque() {
        let err = SchedulingError::Storage(DatabaseError::ConstraintViolation(
            "secret internal detail".into(),
        ));
        assert_eq!(err.to_string(), "Internal storage error");
    }

    #[test]
    fn constraint_violation_maps_to_conflict() {
        let err: SchedulingError =
            DatabaseError::ConstraintViolation("UNIQUE failed".into()).into();
        assert!(matches!(err, SchedulingError::Conflict(_)));
        assert_eq!(err.status_code(), 409);
    }
}
