//! Error taxonomy shared by every service and HTTP handler.
//!
//! Every error is scoped to the request that raised it; nothing here is
//! fatal to the process.

use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Field name to human readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Validation failure on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(fields)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Permission(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found.", what))
    }

    /// Field errors carried by a validation failure, if any.
    pub fn fields(&self) -> Option<&FieldErrors> {
        match self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found.".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(unique_violation_message(db.message()))
            }
            other => AppError::Database(other),
        }
    }
}

/// Map a store-level uniqueness rejection onto the message the matching
/// application-level check would have produced.
fn unique_violation_message(raw: &str) -> String {
    if raw.contains("appointments.doctor_id") {
        "This doctor already has an appointment at this time.".into()
    } else if raw.contains("invoices.appointment_id") {
        "This appointment already has an invoice.".into()
    } else if raw.contains("prescriptions.appointment_id") {
        "This appointment already has a prescription.".into()
    } else if raw.contains("identities.username") {
        "A user with that username already exists.".into()
    } else if raw.contains("doctor_profiles.license_number") {
        "A doctor with that license number already exists.".into()
    } else {
        format!("Uniqueness constraint violated: {}", raw)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("invalid value ({})", e.code),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation(fields)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid token: {}", err))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            // Storage details stay in the logs.
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Internal server error." })
            }
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
