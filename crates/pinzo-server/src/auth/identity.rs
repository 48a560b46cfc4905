//! Signed-in identities and the auth service seam.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use thiserror::Error;

use pinzo_proto::OwnerId;

use crate::error::AppError;

/// The user behind a validated session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Owner id used to scope every record.
    pub owner_id: OwnerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Credential expiry (Unix timestamp, seconds).
    pub expires_at: u64,
}

impl Identity {
    pub fn new(owner_id: impl Into<OwnerId>, expires_at: u64) -> Self {
        Self {
            owner_id: owner_id.into(),
            email: None,
            name: None,
            avatar_url: None,
            expires_at,
        }
    }
}

/// Authentication failures. All of them leave the request unauthenticated.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential on the request.
    #[error("no session credential")]
    MissingCredential,

    /// Credential expired.
    #[error("session expired")]
    Expired,

    /// Credential failed verification.
    #[error("invalid session credential: {0}")]
    Invalid(String),

    /// The auth service is not configured.
    #[error("auth configuration error: {0}")]
    Config(String),
}

/// Validates session credentials.
pub trait AuthService: Send + Sync {
    /// Resolve the user a credential belongs to.
    fn current_user(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Shared auth service handle.
pub type SharedAuthService = Arc<dyn AuthService>;

/// Handlers taking an `Identity` only run for authenticated requests; the
/// session gate attaches it. Anything else is answered with 401.
#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
