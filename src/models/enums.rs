use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Stored values are the Spanish schema strings.
str_enum!(AppointmentStatus {
    Scheduled => "programada",
    Confirmed => "confirmada",
    InProgress => "en_curso",
    Completed => "completada",
    Cancelled => "cancelada",
    NoShow => "no_asistio",
});

impl AppointmentStatus {
    /// Statuses that count toward the no-double-booking constraint.
    /// Must match the predicate of the `idx_citas_slot_activa` index.
    pub const ACTIVE: [AppointmentStatus; 2] = [Self::Scheduled, Self::Confirmed];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Terminal statuses have no outbound transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

str_enum!(Role {
    Patient => "paciente",
    Doctor => "medico",
    Admin => "administrador",
});

str_enum!(DocumentType {
    NationalId => "dni",
    Passport => "pasaporte",
    ForeignerId => "carnet_extranjeria",
    Other => "otro",
});
