//! Auth API collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crmdesk_auth::{CredentialPair, SessionPayload};

/// Failure returned by any auth endpoint.
///
/// `status_code` is the HTTP status, or `0` when the backend could not be
/// reached at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("auth request failed (status {status_code}): {message}")]
pub struct AuthError {
    pub status_code: u16,
    pub message: String,
}

/// How the session controller reads an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    /// 401: definitive proof the session is invalid.
    Unauthenticated,
    /// 0: backend unreachable.
    Unreachable,
    /// Anything else (5xx, 429, bad body...).
    Transient,
}

impl AuthError {
    pub const UNREACHABLE: u16 = 0;
    pub const UNAUTHORIZED: u16 = 401;

    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(Self::UNAUTHORIZED, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(Self::UNREACHABLE, message)
    }

    pub fn failure(&self) -> AuthFailure {
        match self.status_code {
            Self::UNAUTHORIZED => AuthFailure::Unauthenticated,
            Self::UNREACHABLE => AuthFailure::Unreachable,
            _ => AuthFailure::Transient,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login: fresh tokens plus the same payload as "get current user".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub payload: SessionPayload,
}

impl LoginResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// REST backend operations the session controller depends on.
///
/// Credentials are passed in explicitly: implementations never read the
/// credential store themselves.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError>;

    async fn get_current_user(&self, credentials: &CredentialPair) -> Result<SessionPayload, AuthError>;

    async fn logout(&self, credentials: &CredentialPair) -> Result<(), AuthError>;

    /// Exchange a refresh token for a new pair. A `None` refresh token in the
    /// result means the backend did not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError>;
}
