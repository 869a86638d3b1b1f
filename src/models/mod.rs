//! Row types for every table plus the closed vocabularies stored in them.

pub mod appointment;
pub mod doctor;
pub mod identity;
pub mod invoice;
pub mod money;
pub mod patient;
pub mod prescription;

pub use appointment::{Appointment, AppointmentStatus};
pub use doctor::{DoctorProfile, Specialization};
pub use identity::{AccountSummary, Identity, Role};
pub use invoice::{Invoice, PaymentMethod, PaymentStatus};
pub use money::Money;
pub use patient::{BloodGroup, PatientProfile};
pub use prescription::{MedicationLine, Prescription};

/// Raised when a string does not name any variant of a stored vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a text-backed enum.
/// The wire/storage spelling of each variant is given explicitly.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use text_enum;
