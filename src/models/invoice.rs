use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{text_enum, Money};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
    Insurance,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    Card => "card",
    Online => "online",
    Insurance => "insurance",
});

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: i64,
    #[serde(rename = "appointment")]
    pub appointment_id: i64,
    pub amount: Money,
    pub tax: Money,
    pub discount: Money,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The only way a stored total is ever produced. A total outside the
/// decimal range is a field error on `amount`.
pub fn total_of(amount: Money, tax: Money, discount: Money) -> AppResult<Money> {
    amount
        .checked_add(tax)
        .and_then(|subtotal| subtotal.checked_sub(discount))
        .ok_or_else(|| AppError::invalid("amount", "Ensure the invoice total is within range."))
}
