//! Role-specific profiles: creation alongside their identity, and the
//! doctor and patient directories.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::doctor::default_license_number;
use crate::models::{
    AccountSummary, BloodGroup, DoctorProfile, Identity, Money, PatientProfile, Role,
    Specialization,
};

const DOCTOR_SELECT: &str = "SELECT d.*, i.id AS user_id, i.username AS user_username, \
     i.email AS user_email, i.role AS user_role, i.phone AS user_phone \
     FROM doctor_profiles d JOIN identities i ON i.id = d.identity_id";

const PATIENT_SELECT: &str = "SELECT p.*, i.id AS user_id, i.username AS user_username, \
     i.email AS user_email, i.role AS user_role, i.phone AS user_phone \
     FROM patient_profiles p JOIN identities i ON i.id = p.identity_id";

/// Which profile, if any, was created for a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedProfile {
    Doctor(i64),
    Patient(i64),
    None,
}

/// Create the profile matching a freshly inserted identity, on the same
/// connection (and so the same transaction) as the identity insert.
///
/// Does nothing when the profile already exists.
pub async fn on_identity_created(
    conn: &mut SqliteConnection,
    identity: &Identity,
) -> AppResult<LinkedProfile> {
    let now = Utc::now();
    match identity.role {
        Role::Admin => Ok(LinkedProfile::None),
        Role::Doctor => {
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM doctor_profiles WHERE identity_id = ?")
                    .bind(identity.id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if let Some(id) = existing {
                return Ok(LinkedProfile::Doctor(id));
            }
            let id = sqlx::query(
                "INSERT INTO doctor_profiles (
                    identity_id, specialization, license_number,
                    experience_years, consultation_fee, is_available, created_at
                ) VALUES (?, ?, ?, 0, ?, 1, ?)",
            )
            .bind(identity.id)
            .bind(Specialization::General)
            .bind(default_license_number(identity.id))
            .bind(Money::ZERO)
            .bind(now)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            Ok(LinkedProfile::Doctor(id))
        }
        Role::Patient => {
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM patient_profiles WHERE identity_id = ?")
                    .bind(identity.id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if let Some(id) = existing {
                return Ok(LinkedProfile::Patient(id));
            }
            let id = sqlx::query("INSERT INTO patient_profiles (identity_id, created_at) VALUES (?, ?)")
                .bind(identity.id)
                .bind(now)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
            Ok(LinkedProfile::Patient(id))
        }
    }
}

pub async fn doctor_profile_id(pool: &SqlitePool, identity_id: i64) -> AppResult<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM doctor_profiles WHERE identity_id = ?")
        .bind(identity_id)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn patient_profile_id(pool: &SqlitePool, identity_id: i64) -> AppResult<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM patient_profiles WHERE identity_id = ?")
        .bind(identity_id)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DoctorView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub profile: DoctorProfile,
    #[sqlx(flatten)]
    pub user: AccountSummary,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub profile: PatientProfile,
    #[sqlx(flatten)]
    pub user: AccountSummary,
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DoctorUpdate {
    pub specialization: Option<Specialization>,
    #[validate(length(min = 1, max = 50))]
    pub license_number: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub experience_years: Option<i64>,
    pub consultation_fee: Option<Money>,
    pub is_available: Option<bool>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PatientUpdate {
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: Option<BloodGroup>,
    pub address: Option<String>,
    #[validate(length(max = 15))]
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Clone)]
pub struct ProfileDirectory {
    pool: SqlitePool,
}

impl ProfileDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Doctors =====

    pub async fn list_doctors(&self, caller: &Caller) -> AppResult<Vec<DoctorView>> {
        caller.require_admin_or_doctor()?;
        let sql = format!("{} ORDER BY d.created_at DESC, d.id DESC", DOCTOR_SELECT);
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    /// Open to any authenticated caller, so patients can pick a doctor.
    pub async fn available_doctors(&self) -> AppResult<Vec<DoctorView>> {
        let sql = format!(
            "{} WHERE d.is_available = 1 ORDER BY d.created_at DESC, d.id DESC",
            DOCTOR_SELECT
        );
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get_doctor(&self, caller: &Caller, id: i64) -> AppResult<DoctorView> {
        caller.require_admin_or_doctor()?;
        self.fetch_doctor(id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor"))
    }

    /// The caller's own doctor profile. A missing profile is a 404 here,
    /// unlike scoped listings which just come back empty.
    pub async fn my_doctor_profile(&self, caller: &Caller) -> AppResult<DoctorView> {
        let id = doctor_profile_id(&self.pool, caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor profile"))?;
        self.fetch_doctor(id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor profile"))
    }

    pub async fn update_my_doctor_profile(
        &self,
        caller: &Caller,
        changes: DoctorUpdate,
    ) -> AppResult<DoctorView> {
        let id = doctor_profile_id(&self.pool, caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor profile"))?;
        self.apply_doctor_update(id, changes).await
    }

    pub async fn update_doctor(
        &self,
        caller: &Caller,
        id: i64,
        changes: DoctorUpdate,
    ) -> AppResult<DoctorView> {
        caller.require_admin()?;
        self.apply_doctor_update(id, changes).await
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn delete_doctor(&self, caller: &Caller, id: i64) -> AppResult<()> {
        caller.require_admin()?;
        let result = sqlx::query("DELETE FROM doctor_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Doctor"));
        }
        info!(doctor_id = id, "Doctor profile deleted");
        Ok(())
    }

    async fn fetch_doctor(&self, id: i64) -> AppResult<Option<DoctorView>> {
        let sql = format!("{} WHERE d.id = ?", DOCTOR_SELECT);
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    #[instrument(skip(self, changes))]
    async fn apply_doctor_update(&self, id: i64, changes: DoctorUpdate) -> AppResult<DoctorView> {
        changes.validate()?;
        if let Some(fee) = changes.consultation_fee {
            if fee.is_negative() {
                return Err(AppError::invalid(
                    "consultation_fee",
                    "Ensure this value is greater than or equal to 0.",
                ));
            }
        }
        if self.fetch_doctor(id).await?.is_none() {
            return Err(AppError::not_found("Doctor"));
        }
        if let Some(license) = &changes.license_number {
            let clash: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM doctor_profiles WHERE license_number = ? AND id != ?",
            )
            .bind(license)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            if clash.is_some() {
                warn!(doctor_id = id, "License number already in use");
                return Err(AppError::Conflict(
                    "A doctor with that license number already exists.".into(),
                ));
            }
        }

        sqlx::query(
            "UPDATE doctor_profiles SET
                specialization = COALESCE(?, specialization),
                license_number = COALESCE(?, license_number),
                experience_years = COALESCE(?, experience_years),
                consultation_fee = COALESCE(?, consultation_fee),
                is_available = COALESCE(?, is_available)
             WHERE id = ?",
        )
        .bind(changes.specialization)
        .bind(changes.license_number)
        .bind(changes.experience_years)
        .bind(changes.consultation_fee)
        .bind(changes.is_available)
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(doctor_id = id, "Doctor profile updated");
        self.fetch_doctor(id)
            .await?
            .ok_or_else(|| AppError::not_found("Doctor"))
    }

    // ===== Patients =====

    pub async fn list_patients(&self, caller: &Caller) -> AppResult<Vec<PatientView>> {
        caller.require_admin_or_doctor()?;
        let sql = format!("{} ORDER BY p.created_at DESC, p.id DESC", PATIENT_SELECT);
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn get_patient(&self, caller: &Caller, id: i64) -> AppResult<PatientView> {
        caller.require_admin_or_doctor()?;
        self.fetch_patient(id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient"))
    }

    /// See [`ProfileDirectory::my_doctor_profile`] for why this is a 404.
    pub async fn my_patient_profile(&self, caller: &Caller) -> AppResult<PatientView> {
        let id = patient_profile_id(&self.pool, caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient profile"))?;
        self.fetch_patient(id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient profile"))
    }

    pub async fn update_my_patient_profile(
        &self,
        caller: &Caller,
        changes: PatientUpdate,
    ) -> AppResult<PatientView> {
        let id = patient_profile_id(&self.pool, caller.id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient profile"))?;
        self.apply_patient_update(id, changes).await
    }

    pub async fn update_patient(
        &self,
        caller: &Caller,
        id: i64,
        changes: PatientUpdate,
    ) -> AppResult<PatientView> {
        caller.require_admin()?;
        self.apply_patient_update(id, changes).await
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn delete_patient(&self, caller: &Caller, id: i64) -> AppResult<()> {
        caller.require_admin()?;
        let result = sqlx::query("DELETE FROM patient_profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Patient"));
        }
        info!(patient_id = id, "Patient profile deleted");
        Ok(())
    }

    async fn fetch_patient(&self, id: i64) -> AppResult<Option<PatientView>> {
        let sql = format!("{} WHERE p.id = ?", PATIENT_SELECT);
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    #[instrument(skip(self, changes))]
    async fn apply_patient_update(&self, id: i64, changes: PatientUpdate) -> AppResult<PatientView> {
        changes.validate()?;
        let result = sqlx::query(
            "UPDATE patient_profiles SET
                date_of_birth = COALESCE(?, date_of_birth),
                blood_group = COALESCE(?, blood_group),
                address = COALESCE(?, address),
                emergency_contact = COALESCE(?, emergency_contact),
                medical_history = COALESCE(?, medical_history)
             WHERE id = ?",
        )
        .bind(changes.date_of_birth)
        .bind(changes.blood_group)
        .bind(changes.address)
        .bind(changes.emergency_contact)
        .bind(changes.medical_history)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Patient"));
        }

        info!(patient_id = id, "Patient profile updated");
        self.fetch_patient(id)
            .await?
            .ok_or_else(|| AppError::not_found("Patient"))
    }
}
