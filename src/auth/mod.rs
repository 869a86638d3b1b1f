//! Credential hashing, bearer tokens and the resolved caller.

pub mod password;
pub mod token;

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::Role;

pub use token::{Claims, TokenIssuer, TokenKind, TokenPair};

/// The authenticated identity a request acts as. Services only ever see
/// this, never raw credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Doctor | Role::Patient => Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            )),
        }
    }

    pub fn require_admin_or_doctor(&self) -> AppResult<()> {
        match self.role {
            Role::Admin | Role::Doctor => Ok(()),
            Role::Patient => Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            )),
        }
    }
}
