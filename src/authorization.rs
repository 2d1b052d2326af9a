//! Role-scoped access guard.
//!
//! Narrows what an [`Actor`] can see and touch before any query or mutation
//! runs:
//! - patients see and mutate only their own appointments;
//! - doctors only appointments where they are the assigned doctor;
//! - admins are unrestricted.
//!
//! Scoping happens BEFORE user-supplied filters, so a patient asking for
//! another patient's appointments silently gets their own scope instead.

use uuid::Uuid;

use crate::models::{Actor, Appointment, AppointmentFilter, AppointmentStatus, Role};

/// Mutations gated by [`can_mutate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Field update (non-status).
    Update,
    /// Hard delete.
    Delete,
    /// Status change to the given target.
    Transition(AppointmentStatus),
}

/// Apply the actor's role scope to caller-supplied filters.
///
/// Patient and doctor scopes override any conflicting id in the request.
pub fn scope_filters(actor: &Actor, mut filters: AppointmentFilter) -> AppointmentFilter {
    match actor.role {
        Role::Patient => filters.patient_id = Some(actor.id),
        Role::Doctor => filters.doctor_id = Some(actor.id),
        Role::Admin => {}
    }
    filters
}

/// Whether the actor may run `operation` on this appointment.
///
/// Ownership rules only; transition REACHABILITY is the lifecycle module's
/// concern and is checked separately.
pub fn can_mutate(actor: &Actor, appointment: &Appointment, operation: Operation) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Doctor => {
            if appointment.doctor_id != actor.id {
                return false;
            }
            // Doctors never hard-delete.
            !matches!(operation, Operation::Delete)
        }
        Role::Patient => {
            if appointment.patient_id != actor.id {
                return false;
            }
            match operation {
                Operation::Update => true,
                Operation::Delete => false,
                Operation::Transition(target) => target == AppointmentStatus::Cancelled,
            }
        }
    }
}

/// Whether the actor may book an appointment for the given patient.
/// Patients only book for themselves; doctors and admins for anyone.
pub fn can_create(actor: &Actor, patient_id: Uuid) -> bool {
    match actor.role {
        Role::Patient => actor.id == patient_id,
        Role::Doctor | Role::Admin => true,
    }
}

/// Whether the actor may see this appointment at all.
pub fn can_view(actor: &Actor, appointment: &Appointment) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Doctor => appointment.doctor_id == actor.id,
        Role::Patient => appointment.patient_id == actor.id,
    }
}
