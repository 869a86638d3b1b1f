use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::api::AppState;
use crate::error::AppError;
use crate::models::Role;
use crate::services::Registration;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Public sign-up. Admin accounts are provisioned out of band.
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<Registration>,
) -> Result<HttpResponse, AppError> {
    let registration = body.into_inner();
    if registration.role == Role::Admin {
        warn!(username = %registration.username, "Admin self-registration refused");
        return Err(AppError::forbidden("Admin accounts cannot be self-registered."));
    }
    let identity = state.directory.register(registration).await?;
    Ok(HttpResponse::Created().json(identity))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let identity = state.directory.authenticate(&body.username, &body.password).await?;
    let tokens = state.tokens.issue_pair(&identity)?;
    Ok(HttpResponse::Ok().json(tokens))
}

pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    let access = state.tokens.refresh(&body.refresh)?;
    Ok(HttpResponse::Ok().json(json!({ "access": access })))
}
