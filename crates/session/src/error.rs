use thiserror::Error;

use crate::api::AuthError;
use crate::store::StoreError;

/// Errors surfaced to callers of the session controller.
///
/// Restoration and revalidation never return these: they interpret auth
/// failures themselves. Only explicit user actions (login, manual refresh) do.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("login rejected: {0}")]
    Login(AuthError),

    #[error(transparent)]
    Api(#[from] AuthError),

    #[error("failed to persist credentials: {0}")]
    Store(#[from] StoreError),

    #[error("no refresh token is stored")]
    NoRefreshToken,

    #[error("session changed while the request was in flight")]
    Superseded,
}
