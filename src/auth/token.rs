//! HS256 access/refresh tokens.

use ::config::ConfigError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::Caller;
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn caller(&self) -> AppResult<Caller> {
        let id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid token subject.".into()))?;
        Ok(Caller {
            id,
            username: self.username.clone(),
            role: self.role,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build the issuer from `[auth]`. Token lifetimes must be positive and
    /// small enough to add to the current time.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let access_ttl = lifetime(
            "auth.access_token_minutes",
            config.access_token_minutes,
            Duration::try_minutes,
        )?;
        let refresh_ttl = lifetime(
            "auth.refresh_token_days",
            config.refresh_token_days,
            Duration::try_days,
        )?;
        let secret = if config.jwt_secret.is_empty() {
            warn!("auth.jwt_secret is empty; using an ephemeral secret, tokens will not survive a restart");
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(64)
                .map(char::from)
                .collect()
        } else {
            config.jwt_secret.clone()
        };
        Ok(Self::new(secret.as_bytes(), access_ttl, refresh_ttl))
    }

    pub fn issue_pair(&self, identity: &Identity) -> AppResult<TokenPair> {
        let caller = Caller {
            id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
        };
        Ok(TokenPair {
            access: self.issue(&caller, TokenKind::Access)?,
            refresh: self.issue(&caller, TokenKind::Refresh)?,
        })
    }

    fn issue(&self, caller: &Caller, kind: TokenKind) -> AppResult<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: caller.id.to_string(),
            username: caller.username.clone(),
            role: caller.role,
            kind,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .ok_or_else(|| AppError::Internal("token expiry out of range".into()))?
                .timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {}", e)))
    }

    /// Decode and check signature, expiry and token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.kind != expected {
            return Err(AppError::Unauthorized("Token has wrong type.".into()));
        }
        Ok(data.claims)
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.issue(&claims.caller()?, TokenKind::Access)
    }
}

fn lifetime(key: &str, value: i64, to_duration: fn(i64) -> Option<Duration>) -> Result<Duration, ConfigError> {
    to_duration(value)
        .filter(|ttl| *ttl > Duration::zero() && Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| ConfigError::Message(format!("{} is out of range: {}", key, value)))
}
