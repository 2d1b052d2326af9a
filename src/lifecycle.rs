//! Appointment status lifecycle.
//!
//! State graph:
//! ```text
//! scheduled ──> confirmed ──> in_progress ──> completed
//!     │             │              │
//!     ├─> cancelled ├─> cancelled  └─> cancelled
//!     └─> no_show   └─> no_show
//! ```
//! `completed`, `cancelled`, and `no_show` are terminal. Validation here is
//! pure: the repository's `change_status` is the only path that persists a
//! status change.

use tracing::warn;

use crate::authorization::{self, Operation};
use crate::error::SchedulingError;
use crate::models::{Actor, Appointment, AppointmentStatus};

/// All states reachable from `status` in one transition.
pub fn valid_transitions(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match status {
        Scheduled => &[Confirmed, InProgress, Cancelled, NoShow],
        Confirmed => &[InProgress, Cancelled, NoShow],
        InProgress => &[Completed, Cancelled],
        Completed | Cancelled | NoShow => &[],
    }
}

/// Check that `target` is reachable from the appointment's current status
/// AND that the actor's role permits requesting it.
///
/// Role policy (re-validated here, independent of the caller's guard):
/// - patient: only `Cancelled`, only on their own appointment;
/// - doctor: any reachable transition on their own appointments;
/// - admin: any reachable transition anywhere.
pub fn authorize_transition(
    appointment: &Appointment,
    target: AppointmentStatus,
    actor: &Actor,
) -> Result<(), SchedulingError> {
    if !authorization::can_mutate(actor, appointment, Operation::Transition(target)) {
        warn!(
            appointment_id = %appointment.id,
            actor_id = %actor.id,
            role = actor.role.as_str(),
            target = target.as_str(),
            "transition refused by role policy"
        );
        return Err(SchedulingError::Forbidden(format!(
            "role {} may not move this appointment to {}",
            actor.role.as_str(),
            target.as_str()
        )));
    }

    if !valid_transitions(appointment.status).contains(&target) {
        warn!(
            appointment_id = %appointment.id,
            from = appointment.status.as_str(),
            to = target.as_str(),
            "unreachable status transition"
        );
        return Err(SchedulingError::InvalidTransition {
            from: appointment.status,
            to: target,
        });
    }

    Ok(())
}
