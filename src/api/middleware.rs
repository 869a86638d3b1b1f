//! Request authentication.

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use tracing::debug;

use super::AppState;
use crate::auth::{Caller, TokenKind};
use crate::error::{AppError, AppResult};

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";

/// Any handler taking a `Caller` requires a valid `Authorization: Bearer`
/// access token.
impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> AppResult<Caller> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("application state not registered".into()))?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(MISSING_CREDENTIALS.into()))?;

    let caller = state.tokens.verify(token, TokenKind::Access)?.caller()?;
    debug!(caller = caller.id, role = %caller.role, "Authenticated request");
    Ok(caller)
}
