use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// The authenticated identity performing an operation, resolved by the
/// external authentication collaborator and passed into every core call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
