use actix_web::{web, HttpResponse};

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;
use crate::services::prescriptions::{NewPrescription, PrescriptionChanges};

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.prescriptions.list(&caller).await?))
}

pub async fn create(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<NewPrescription>,
) -> Result<HttpResponse, AppError> {
    let prescription = state.prescriptions.create(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(prescription))
}

pub async fn retrieve(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.prescriptions.get(&caller, *id).await?))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<PrescriptionChanges>,
) -> Result<HttpResponse, AppError> {
    let prescription = state
        .prescriptions
        .update(&caller, *id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(prescription))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.prescriptions.delete(&caller, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
