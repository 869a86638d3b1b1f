use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;
use crate::services::billing::{InvoiceChanges, NewInvoice};

#[derive(Debug, Default, Deserialize)]
pub struct MarkPaid {
    pub payment_method: Option<String>,
}

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.billing.list(&caller).await?))
}

pub async fn create(
    state: web::Data<AppState>,
    caller: Caller,
    body: web::Json<NewInvoice>,
) -> Result<HttpResponse, AppError> {
    let invoice = state.billing.create(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(invoice))
}

pub async fn retrieve(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.billing.get(&caller, *id).await?))
}

pub async fn update(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: web::Json<InvoiceChanges>,
) -> Result<HttpResponse, AppError> {
    let invoice = state.billing.update(&caller, *id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// The body is optional; without one the invoice is settled in cash.
pub async fn mark_paid(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
    body: Option<web::Json<MarkPaid>>,
) -> Result<HttpResponse, AppError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let invoice = state
        .billing
        .mark_paid(&caller, *id, body.payment_method.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(invoice))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    id: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    state.billing.delete(&caller, *id).await?;
    Ok(HttpResponse::NoContent().finish())
}
