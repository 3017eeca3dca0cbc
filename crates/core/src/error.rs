//! Validation errors for shared primitives.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A value received from the backend or from configuration was unusable.
///
/// Transport and storage failures have their own error types in the crates
/// that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
