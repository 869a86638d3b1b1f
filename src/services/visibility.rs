//! Narrows appointment, invoice and prescription collections to what a
//! caller's role entitles them to see.
//!
//! All three collections are filtered through the owning appointment,
//! aliased `a` in every scoped query.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::profiles;
use crate::auth::Caller;
use crate::error::AppResult;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Admin: the whole collection.
    All,
    /// Rows whose appointment belongs to this doctor profile.
    Doctor(i64),
    /// Rows whose appointment belongs to this patient profile.
    Patient(i64),
    /// A doctor or patient account without its profile sees nothing.
    Nothing,
}

impl Scope {
    pub async fn resolve(pool: &SqlitePool, caller: &Caller) -> AppResult<Scope> {
        let scope = match caller.role {
            Role::Admin => Scope::All,
            Role::Doctor => profiles::doctor_profile_id(pool, caller.id)
                .await?
                .map_or(Scope::Nothing, Scope::Doctor),
            Role::Patient => profiles::patient_profile_id(pool, caller.id)
                .await?
                .map_or(Scope::Nothing, Scope::Patient),
        };
        Ok(scope)
    }

    /// Append the `WHERE` clause for this scope. Callers may continue with
    /// `AND ...`.
    pub fn push_filter(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        match *self {
            Scope::All => {
                query.push(" WHERE 1 = 1");
            }
            Scope::Doctor(id) => {
                query.push(" WHERE a.doctor_id = ").push_bind(id);
            }
            Scope::Patient(id) => {
                query.push(" WHERE a.patient_id = ").push_bind(id);
            }
            Scope::Nothing => {
                query.push(" WHERE 0 = 1");
            }
        }
    }

    /// Whether an appointment between these two profiles is inside the scope.
    pub fn covers(&self, doctor_id: i64, patient_id: i64) -> bool {
        match *self {
            Scope::All => true,
            Scope::Doctor(id) => id == doctor_id,
            Scope::Patient(id) => id == patient_id,
            Scope::Nothing => false,
        }
    }

    /// Admin, or the doctor assigned to the appointment.
    pub fn is_admin_or_assigned_doctor(&self, doctor_id: i64) -> bool {
        match *self {
            Scope::All => true,
            Scope::Doctor(id) => id == doctor_id,
            Scope::Patient(_) | Scope::Nothing => false,
        }
    }
}
