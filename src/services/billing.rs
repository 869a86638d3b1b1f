//! Invoices, one per appointment. The stored total is always derived
//! server-side from amount, tax and discount.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, instrument, warn};

use super::visibility::Scope;
use crate::auth::Caller;
use crate::error::{AppError, AppResult};
use crate::models::invoice::total_of;
use crate::models::{Invoice, Money, PaymentMethod, PaymentStatus};

const INVOICE_SELECT: &str =
    "SELECT i.* FROM invoices i JOIN appointments a ON a.id = i.appointment_id";

/// Any `total_amount` in the request body is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub appointment: i64,
    pub amount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub discount: Money,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
}

/// Absent fields are left unchanged; the total is recomputed regardless.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceChanges {
    pub amount: Option<Money>,
    pub tax: Option<Money>,
    pub discount: Option<Money>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
}

fn ensure_non_negative(field: &str, value: Money) -> AppResult<()> {
    if value.is_negative() {
        return Err(AppError::invalid(
            field,
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BillingLedger {
    pool: SqlitePool,
}

impl BillingLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, caller: &Caller) -> AppResult<Vec<Invoice>> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        let mut query = QueryBuilder::<Sqlite>::new(INVOICE_SELECT);
        scope.push_filter(&mut query);
        query.push(" ORDER BY i.created_at DESC, i.id DESC");
        Ok(query
            .build_query_as::<Invoice>()
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, caller: &Caller, id: i64) -> AppResult<Invoice> {
        let scope = Scope::resolve(&self.pool, caller).await?;
        self.fetch_scoped(scope, id).await
    }

    #[instrument(skip(self, caller, invoice), fields(caller = caller.id, appointment = invoice.appointment))]
    pub async fn create(&self, caller: &Caller, invoice: NewInvoice) -> AppResult<Invoice> {
        caller.require_admin()?;
        ensure_non_negative("amount", invoice.amount)?;
        ensure_non_negative("tax", invoice.tax)?;
        ensure_non_negative("discount", invoice.discount)?;

        let total = total_of(invoice.amount, invoice.tax, invoice.discount)?;

        let appointment: Option<i64> = sqlx::query_scalar("SELECT id FROM appointments WHERE id = ?")
            .bind(invoice.appointment)
            .fetch_optional(&self.pool)
            .await?;
        if appointment.is_none() {
            return Err(AppError::invalid(
                "appointment",
                format!("Invalid pk \"{}\" - object does not exist.", invoice.appointment),
            ));
        }
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM invoices WHERE appointment_id = ?")
                .bind(invoice.appointment)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            warn!("Appointment already invoiced");
            return Err(AppError::Conflict(
                "This appointment already has an invoice.".into(),
            ));
        }

        // A racing duplicate fails the UNIQUE appointment_id constraint.
        let id = sqlx::query(
            "INSERT INTO invoices (
                appointment_id, amount, tax, discount, total_amount,
                payment_status, payment_method, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(invoice.appointment)
        .bind(invoice.amount)
        .bind(invoice.tax)
        .bind(invoice.discount)
        .bind(total)
        .bind(invoice.payment_status.unwrap_or(PaymentStatus::Pending))
        .bind(invoice.payment_method)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(invoice_id = id, "Invoice created");
        self.fetch_scoped(Scope::All, id).await
    }

    #[instrument(skip(self, caller, changes), fields(caller = caller.id))]
    pub async fn update(&self, caller: &Caller, id: i64, changes: InvoiceChanges) -> AppResult<Invoice> {
        caller.require_admin()?;
        let current = self.fetch_scoped(Scope::All, id).await?;

        let amount = changes.amount.unwrap_or(current.amount);
        let tax = changes.tax.unwrap_or(current.tax);
        let discount = changes.discount.unwrap_or(current.discount);
        ensure_non_negative("amount", amount)?;
        ensure_non_negative("tax", tax)?;
        ensure_non_negative("discount", discount)?;
        let total = total_of(amount, tax, discount)?;

        sqlx::query(
            "UPDATE invoices SET
                amount = ?, tax = ?, discount = ?, total_amount = ?,
                payment_status = ?, payment_method = ?
             WHERE id = ?",
        )
        .bind(amount)
        .bind(tax)
        .bind(discount)
        .bind(total)
        .bind(changes.payment_status.unwrap_or(current.payment_status))
        .bind(changes.payment_method.or(current.payment_method))
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(invoice_id = id, "Invoice updated");
        self.fetch_scoped(Scope::All, id).await
    }

    /// Settle an invoice. The method defaults to cash.
    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn mark_paid(&self, caller: &Caller, id: i64, method: Option<&str>) -> AppResult<Invoice> {
        caller.require_admin()?;
        let method = match method {
            Some(raw) => raw
                .parse::<PaymentMethod>()
                .map_err(|e| AppError::invalid("payment_method", e.to_string()))?,
            None => PaymentMethod::default(),
        };
        self.fetch_scoped(Scope::All, id).await?;

        sqlx::query(
            "UPDATE invoices SET payment_status = ?, payment_method = ?, paid_at = ? WHERE id = ?",
        )
        .bind(PaymentStatus::Paid)
        .bind(method)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        info!(invoice_id = id, %method, "Invoice paid");
        self.fetch_scoped(Scope::All, id).await
    }

    #[instrument(skip(self, caller), fields(caller = caller.id))]
    pub async fn delete(&self, caller: &Caller, id: i64) -> AppResult<()> {
        caller.require_admin()?;
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Invoice"));
        }
        info!(invoice_id = id, "Invoice deleted");
        Ok(())
    }

    async fn fetch_scoped(&self, scope: Scope, id: i64) -> AppResult<Invoice> {
        let mut query = QueryBuilder::<Sqlite>::new(INVOICE_SELECT);
        scope.push_filter(&mut query);
        query.push(" AND i.id = ").push_bind(id);
        query
            .build_query_as::<Invoice>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice"))
    }
}
