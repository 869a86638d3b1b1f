//! Prescriptions, at most one per appointment, written by the assigned
//! doctor or an admin.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::visibility::Scope;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::{MedicationLine, Prescription};

const PRESCRIPTION_SELECT: &str =
    "SELECT r.* FROM prescriptions r JOIN appointments a ON a.id = r.appointment_id";

const NOT_ASSIGNED: &str = "Only an admin or the assigned doctor can write prescriptions.";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPrescription {
    pub appointment: i64,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub diagnosis: String,
    #[serde(default)]
    pub medications: Vec<MedicationLine>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PrescriptionChanges {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub diagnosis: Option<String>,
    pub medications: Option<Vec<MedicationLine>>,
    pub instructions: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct PrescriptionLedger {
    pool: SqlitePool,
}

impl PrescriptionLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, caller: &Caller) -> AppResult<Vec<Prescription>> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        let mut query = QueryBuilder::<Sqlite>::new(PRESCRIPTION_SELECT);
        scope.push_filter(&mut query);
        query.push(" ORDER BY r.created_at DESC, r.id DESC");
        Ok(query
            .build_query_as::<Prescription>()
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> AppResult<Prescription> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        self.fetch_scoped(scope, id).await
    }

    #[instrument(skip(self, caller, prescription), fields(caller = caller.id, appointment = prescription.appointment))]
    pub async fn create(&self, caller: &Caller, prescription: NewPrescription) -> AppResult<Prescription> {
        caller.require_admin_or_doctor()?;
        prescription.validate()?;
        if prescription.diagnosis.trim().is_empty() {
            return Err(AppError::invalid("diagnosis", "This field may not be blank."));
        }

        let scope = Scope::resolve(&self.pool, caller).await?;
        let doctor_id = self
            .appointment_doctor(prescription.appointment)
            .await?
            .ok_or_else(|| {
                AppError::invalid(
                    "appointment",
                    format!("Invalid pk \"{}\" - object does not exist.", prescription.appointment),
                )
            })?;
        if !scope.is_admin_or_assigned_doctor(doctor_id) {
            warn!("Prescription by unassigned doctor rejected");
            return Err(AppError::forbidden(NOT_ASSIGNED));
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM prescriptions WHERE appointment_id = ?")
                .bind(prescription.appointment)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(
                "This appointment already has a prescription.".into(),
            ));
        }

        // A racing duplicate fails the UNIQUE appointment_id constraint.
        let id = sqlx::query(
            "INSERT INTO prescriptions (
                appointment_id, diagnosis, medications, instructions, follow_up_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(prescription.appointment)
        .bind(&prescription.diagnosis)
        .bind(Json(&prescription.medications))
        .bind(&prescription.instructions)
        .bind(prescription.follow_up_date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(prescription_id = id, medications = prescription.medications.len(), "Prescription written");
        self.fetch_scoped(Scope::All, id).await
    }

    #[instrument(skip(self, caller, changes), fields(caller = caller.id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        changes: PrescriptionChanges,
    ) -> AppResult<Prescription> {
        changes.validate()?;
        if matches!(&changes.diagnosis, Some(d) if d.trim().is_empty()) {
            return Err(AppError::invalid("diagnosis", "This field may not be blank."));
        }
        self.writable(caller, id).await?;

        sqlx::query(
            "UPDATE prescriptions SET
                diagnosis = COALESCE(?, diagnosis),
                medications = COALESCE(?, medications),
                instructions = COALESCE(?, instructions),
                follow_up_date = COALESCE(?, follow_up_date)
             WHERE id = ?",
        )
        .bind(&changes.diagnosis)
        .bind(changes.medications.as_ref().map(Json))
        .bind(&changes.instructions)
        .bind(changes.follow_up_date)
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(prescription_id = id, "Prescription updated");
        self.fetch_scoped(Scope::All, id).await
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn delete(&self, caller: &Caller, id: i64) -> AppResult<()> {
        self.writable(caller, id).await?;
        sqlx::query("DELETE FROM prescriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!(prescription_id = id, "Prescription deleted");
        Ok(())
    }

    /// The record must be visible to the caller, and the caller must be an
    /// admin or the doctor on its appointment.
    async fn writable(&self, caller: &Caller, id: i64) -> AppResult<Prescription> {
        caller.require_admin_or_doctor()?;
        let scope = Scope::resolve(&self.pool, caller).await?;
        let current = self.fetch_scoped(scope, id).await?;
        let doctor_id = self
            .appointment_doctor(current.appointment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Appointment"))?;
        if !scope.is_admin_or_assigned_doctor(doctor_id) {
            return Err(AppError::forbidden(NOT_ASSIGNED));
        }
        Ok(current)
    }

    async fn appointment_doctor(&self, appointment_id: i64) -> AppResult<Option<i64>> {
        Ok(sqlx::query_scalar("SELECT doctor_id FROM appointments WHERE id = ?")
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn fetch_scoped(&self, scope: Scope, id: i64) -> AppResult<Prescription> {
        let mut query = QueryBuilder::<Sqlite>::new(PRESCRIPTION_SELECT);
        scope.push_filter(&mut query);
        query.push(" AND r.id = ").push_bind(id);
        query
            .build_query_as::<Prescription>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Prescription"))
    }
}
