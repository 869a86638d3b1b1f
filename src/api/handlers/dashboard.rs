use actix_web::{web, HttpResponse};

use crate::api::AppState;
use crate::auth::Caller;
use crate::error::AppError;

pub async fn stats(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.dashboard.stats(&caller).await?))
}
