//! `crmdesk-core`: shared primitives for the CRM client.
//!
//! Identifiers and the validation error model used by the auth and session
//! crates. No IO, no async.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, UserId};
