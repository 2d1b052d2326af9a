//! Famicitas scheduling core.
//!
//! The appointment (cita) engine behind the Famicitas clinic app: booking
//! with double-booking protection, availability and slot listing, the
//! appointment status lifecycle, and role-scoped access for patients,
//! doctors, and admins.
//!
//! Transport and authentication are external collaborators. Every operation
//! takes an explicit [`models::Actor`] (id + role) and a `rusqlite`
//! connection; nothing here holds global state.

pub mod authorization;
pub mod availability;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;

pub use error::SchedulingError;
