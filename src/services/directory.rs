//! Accounts: registration, credential checks and role lookups.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::profiles::{self, LinkedProfile};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::models::{Identity, Role};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    #[validate(length(max = 15))]
    pub phone: String,
}

#[derive(Clone)]
pub struct IdentityDirectory {
    pool: SqlitePool,
}

impl IdentityDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an identity and its role profile in one transaction: either
    /// both rows exist afterwards or neither does.
    #[instrument(skip(self, registration), fields(username = %registration.username, role = %registration.role))]
    pub async fn register(&self, registration: Registration) -> AppResult<Identity> {
        registration.validate()?;
        let password_hash = hash_password(&registration.password)?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM identities WHERE username = ?")
            .bind(&registration.username)
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            warn!("Username already taken");
            return Err(AppError::Conflict(
                "A user with that username already exists.".into(),
            ));
        }

        let created_at = Utc::now();
        // The insert opens the transaction. A racing writer waits for the
        // lock, then fails the UNIQUE username constraint.
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO identities (username, email, password_hash, role, phone, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&registration.username)
        .bind(&registration.email)
        .bind(&password_hash)
        .bind(registration.role)
        .bind(&registration.phone)
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let identity = Identity {
            id,
            username: registration.username,
            email: registration.email,
            password_hash,
            role: registration.role,
            phone: registration.phone,
            created_at,
        };

        let linked = profiles::on_identity_created(&mut *tx, &identity).await?;
        tx.commit().await?;

        match linked {
            LinkedProfile::Doctor(profile) => info!(identity_id = id, doctor_id = profile, "Doctor registered"),
            LinkedProfile::Patient(profile) => info!(identity_id = id, patient_id = profile, "Patient registered"),
            LinkedProfile::None => info!(identity_id = id, "Admin registered"),
        }
        Ok(identity)
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// fail identically.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<Identity> {
        let identity: Option<Identity> =
            sqlx::query_as("SELECT * FROM identities WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        match identity {
            Some(identity) if verify_password(password, &identity.password_hash) => Ok(identity),
            _ => {
                warn!("Rejected login");
                Err(AppError::Unauthorized(
                    "No active account found with the given credentials.".into(),
                ))
            }
        }
    }

    pub async fn get(&self, id: i64) -> AppResult<Identity> {
        sqlx::query_as("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn classify(&self, id: i64) -> AppResult<Role> {
        Ok(self.get(id).await?.classify())
    }

    pub async fn count_by_role(&self, role: Role) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE role = ?")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
