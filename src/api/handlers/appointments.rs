use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;
use crate::services::scheduling::{AppointmentChanges, NewAppointment};

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: Option<String>,
}

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.scheduling.list(&caller).await?))
}

pub async fn create(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<NewAppointment>,
) -> Result<HttpResponse, AppError> {
    let appointment = state.scheduling.create(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(appointment))
}

pub async fn retrieve(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.scheduling.get(&caller, *id).await?))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<AppointmentChanges>,
) -> Result<HttpResponse, AppError> {
    let appointment = state.scheduling.update(&caller, *id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

pub async fn update_status(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<StatusChange>,
) -> Result<HttpResponse, AppError> {
    let status = body.status.as_deref().unwrap_or_default();
    let appointment = state.scheduling.set_status(&caller, *id, status).await?;
    Ok(HttpResponse::Ok().json(appointment))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.scheduling.delete(&caller, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
