use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{text_enum, Money};

pub const LICENSE_PREFIX: &str = "LIC-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Specialization {
    General,
    Cardiology,
    Neurology,
    Orthopedics,
    Pediatrics,
    Dermatology,
    Other,
}

text_enum!(Specialization, "specialization", {
    General => "general",
    Cardiology => "cardiology",
    Neurology => "neurology",
    Orthopedics => "orthopedics",
    Pediatrics => "pediatrics",
    Dermatology => "dermatology",
    Other => "other",
});

impl Default for Specialization {
    fn default() -> Self {
        Specialization::General
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DoctorProfile {
    pub id: i64,
    pub identity_id: i64,
    pub specialization: Specialization,
    pub license_number: String,
    pub experience_years: i64,
    pub consultation_fee: Money,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// License number assigned when a doctor account is created.
pub fn default_license_number(identity_id: i64) -> String {
    format!("{}{:06}", LICENSE_PREFIX, identity_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_number_is_prefixed_and_zero_padded() {
        assert_eq!(default_license_number(7), "LIC-000007");
        assert_eq!(default_license_number(123456), "LIC-123456");
        assert_eq!(default_license_number(1234567), "LIC-1234567");
    }
}
