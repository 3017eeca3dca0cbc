//! Strongly-typed identifiers handed out by the CRM backend.
//!
//! The backend owns identifier generation, so these are opaque strings: the
//! client only checks that they are non-empty and free of whitespace.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of a CRM user (the person behind a session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Identifier of the company (tenant) a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompanyId(String);

fn check_opaque_id(raw: &str, name: &str) -> DomainResult<()> {
    if raw.is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: empty")));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(DomainError::invalid_id(format!("{name}: contains whitespace")));
    }
    Ok(())
}

macro_rules! impl_opaque_id {
    ($t:ident, $name:literal) => {
        impl $t {
            /// Wrap a backend identifier, rejecting empty or whitespace-bearing values.
            pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
                let raw = raw.into();
                check_opaque_id(&raw, $name)?;
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_opaque_id!(UserId, "UserId");
impl_opaque_id!(CompanyId, "CompanyId");
