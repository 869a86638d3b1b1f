use actix_web::{web, HttpResponse};

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;
use crate::services::profiles::DoctorUpdate;

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.list_doctors(&caller).await?))
}

/// Any signed-in caller may browse bookable doctors.
pub async fn available(state: web::Data<AppState>, _caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.available_doctors().await?))
}

pub async fn me(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.my_doctor_profile(&caller).await?))
}

pub async fn update_me(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<DoctorUpdate>,
) -> Result<HttpResponse, AppError> {
    let doctor = state
        .profiles
        .update_my_doctor_profile(&caller, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(doctor))
}

pub async fn retrieve(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.get_doctor(&caller, *id).await?))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<DoctorUpdate>,
) -> Result<HttpResponse, AppError> {
    let doctor = state
        .profiles
        .update_doctor(&caller, *id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(doctor))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.profiles.delete_doctor(&caller, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
