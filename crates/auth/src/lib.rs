//! `crmdesk-auth`: pure authorization boundary for the CRM client.
//!
//! Roles, capabilities, the session value pages read, and structural checks
//! for stored tokens. Decoupled from HTTP, storage and timers.

pub mod authorize;
pub mod credentials;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthorizationExplanation, AuthzError, PermissionOracle};
pub use credentials::{CredentialPair, TokenDefect, inspect_token};
pub use permissions::{Capability, CapabilityTable};
pub use principal::{Company, Session, SessionPayload, SessionUser};
pub use roles::Role;
