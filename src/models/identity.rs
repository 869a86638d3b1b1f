use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;

/// The closed set of account roles. Every authorization decision matches
/// on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Doctor => "doctor",
    Patient => "patient",
});

impl Default for Role {
    fn default() -> Self {
        Role::Patient
    }
}

/// An account. The role never changes after registration.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn classify(&self) -> Role {
        self.role
    }
}

/// The account fields embedded in profile listings. Read from columns
/// aliased with a `user_` prefix so it can sit beside a profile row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AccountSummary {
    #[sqlx(rename = "user_id")]
    pub id: i64,
    #[sqlx(rename = "user_username")]
    pub username: String,
    #[sqlx(rename = "user_email")]
    pub email: String,
    #[sqlx(rename = "user_role")]
    pub role: Role,
    #[sqlx(rename = "user_phone")]
    pub phone: String,
}
