use actix_web::{web, HttpResponse};

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;
use crate::services::profiles::PatientUpdate;

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.list_patients(&caller).await?))
}

pub async fn me(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.my_patient_profile(&caller).await?))
}

pub async fn update_me(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<PatientUpdate>,
) -> Result<HttpResponse, AppError> {
    let patient = state
        .profiles
        .update_my_patient_profile(&caller, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(patient))
}

pub async fn retrieve(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.profiles.get_patient(&caller, *id).await?))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<PatientUpdate>,
) -> Result<HttpResponse, AppError> {
    let patient = state
        .profiles
        .update_patient(&caller, *id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(patient))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.profiles.delete_patient(&caller, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
