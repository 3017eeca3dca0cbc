//! `crmdesk-session`
//!
//! **Responsibility:** the client-side session lifecycle of the CRM dashboard.
//!
//! This crate provides:
//! - Silent session restoration from stored credentials
//! - Periodic background revalidation (one timer at most)
//! - Credential sanitation and cleanup on invalidation
//! - Role vs. route-area redirects (public / protected / privileged)
//!
//! The backend, router, notification surface and credential storage are
//! collaborators behind traits; the controller is the only writer of the
//! session and of the stored credentials.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod notify;
mod revalidation;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;

pub use api::{AuthApi, AuthError, AuthFailure, LoginRequest, LoginResponse};
pub use config::SessionConfig;
pub use controller::{InitOutcome, SessionController};
pub use error::SessionError;
pub use http::HttpAuthApi;
pub use notify::{Notifier, Severity, TracingNotifier};
pub use router::{HistoryRouter, Router};
pub use routes::{RouteClass, RouteTable, reconcile_redirect};
pub use state::{Lifecycle, SessionReader};
pub use store::{
    CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    NullCredentialStore, SanitationReport, StoreError, sanitize_credentials,
};

pub use crmdesk_auth::{Capability, CredentialPair, Role, Session, SessionPayload};
