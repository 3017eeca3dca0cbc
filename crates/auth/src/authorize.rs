use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{Capability, CapabilityTable, Role, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("role '{0}' is not recognized by this client")]
    UnrecognizedRole(String),

    #[error("forbidden: missing capability '{0}'")]
    Forbidden(String),
}

/// Stateless permission decisions over a session's role.
///
/// - No IO
/// - No panics: every query on an empty session or unknown role is `false`
/// - One table for every page
#[derive(Debug, Clone, Default)]
pub struct PermissionOracle {
    table: Arc<CapabilityTable>,
}

impl PermissionOracle {
    pub fn new(table: CapabilityTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.table
    }

    /// Exact role membership. No hierarchy: an admin does not "have" manager.
    pub fn has_role(&self, session: &Session, required: &Role) -> bool {
        match session.role() {
            Some(role) => role.is_recognized() && role == required,
            None => false,
        }
    }

    /// Role equals or outranks `minimum`.
    pub fn has_role_at_least(&self, session: &Session, minimum: &Role) -> bool {
        session.role().is_some_and(|role| role.is_at_least(minimum))
    }

    pub fn can(&self, session: &Session, capability: &Capability) -> bool {
        session
            .role()
            .is_some_and(|role| self.table.allows(role, capability))
    }

    /// Result-returning form of [`PermissionOracle::can`] for call sites that
    /// propagate with `?`.
    pub fn authorize(&self, session: &Session, capability: &Capability) -> Result<(), AuthzError> {
        let role = session.role().ok_or(AuthzError::Unauthenticated)?;
        if !role.is_recognized() {
            return Err(AuthzError::UnrecognizedRole(role.as_str().to_string()));
        }
        if self.table.allows(role, capability) {
            Ok(())
        } else {
            Err(AuthzError::Forbidden(capability.as_str().to_string()))
        }
    }

    /// Explain why a capability check was granted or denied.
    ///
    /// Meant for audit logs and the "why can't I see this button" support view.
    pub fn explain(&self, session: &Session, capability: &Capability) -> AuthorizationExplanation {
        let role = session.role().map(|r| r.as_str().to_string());
        let effective_capabilities = session
            .role()
            .map(|r| {
                self.table
                    .capabilities_of(r)
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mut granting_roles: Vec<String> = self
            .table
            .allowed_roles(capability)
            .map(|roles| roles.iter().map(|r| r.as_str().to_string()).collect())
            .unwrap_or_default();
        granting_roles.sort();

        let (granted, denial) = match self.authorize(session, capability) {
            Ok(()) => (true, None),
            Err(AuthzError::Unauthenticated) => (false, Some(DenialKind::Unauthenticated)),
            Err(AuthzError::UnrecognizedRole(_)) => (false, Some(DenialKind::UnrecognizedRole)),
            Err(AuthzError::Forbidden(_)) if self.table.allowed_roles(capability).is_none() => {
                (false, Some(DenialKind::UnknownCapability))
            }
            Err(AuthzError::Forbidden(_)) => (false, Some(DenialKind::MissingCapability)),
        };

        let reason = match denial {
            None => format!(
                "role '{}' is allowed to '{}'",
                role.as_deref().unwrap_or_default(),
                capability
            ),
            Some(DenialKind::Unauthenticated) => "no active session".to_string(),
            Some(DenialKind::UnrecognizedRole) => format!(
                "role '{}' is not recognized; unknown roles are denied everything",
                role.as_deref().unwrap_or_default()
            ),
            Some(DenialKind::UnknownCapability) => {
                format!("capability '{}' is not in the capability table", capability)
            }
            Some(DenialKind::MissingCapability) => format!(
                "role '{}' is not allowed to '{}'; allowed roles: {:?}",
                role.as_deref().unwrap_or_default(),
                capability,
                granting_roles
            ),
        };

        AuthorizationExplanation {
            capability: capability.as_str().to_string(),
            granted,
            reason,
            role,
            effective_capabilities,
            granting_roles,
            denial,
        }
    }
}

/// Auditable record of a capability decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub capability: String,
    pub granted: bool,
    pub reason: String,
    pub role: Option<String>,
    pub effective_capabilities: Vec<String>,
    pub granting_roles: Vec<String>,
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Unauthenticated,
    UnrecognizedRole,
    UnknownCapability,
    MissingCapability,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionUser;
    use crmdesk_core::UserId;

    fn session_as(role: &str) -> Session {
        Session::authenticated(
            SessionUser {
                id: UserId::new("u-1").unwrap(),
                name: "Sam".to_string(),
                email: "sam@acme.test".to_string(),
                role: Role::parse(role),
            },
            None,
        )
    }

    #[test]
    fn no_session_fails_closed() {
        let oracle = PermissionOracle::default();
        let nobody = Session::unauthenticated();

        assert!(!oracle.can(&nobody, &Capability::MANAGE_ROLES));
        assert!(!oracle.has_role(&nobody, &Role::SuperAdmin));
        assert!(!oracle.has_role_at_least(&nobody, &Role::Employee));
        assert_eq!(
            oracle.authorize(&nobody, &Capability::MANAGE_ROLES),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn has_role_is_exact_match() {
        let oracle = PermissionOracle::default();
        let root = session_as("super_admin");
        let admin = session_as("admin");

        assert!(oracle.has_role(&root, &Role::SuperAdmin));
        assert!(!oracle.has_role(&admin, &Role::SuperAdmin));
        assert!(!oracle.has_role(&root, &Role::Admin));
        assert!(oracle.has_role_at_least(&root, &Role::Admin));
    }

    #[test]
    fn unrecognized_role_fails_closed() {
        let oracle = PermissionOracle::default();
        let future = session_as("regional_director");

        assert!(!oracle.can(&future, &Capability::VIEW_REPORTS));
        assert!(!oracle.has_role(&future, &Role::Unrecognized("regional_director".into())));
        assert!(matches!(
            oracle.authorize(&future, &Capability::VIEW_REPORTS),
            Err(AuthzError::UnrecognizedRole(_))
        ));
    }

    #[test]
    fn can_follows_capability_table() {
        let oracle = PermissionOracle::default();
        assert!(oracle.can(&session_as("manager"), &Capability::ASSIGN_TASK));
        assert!(!oracle.can(&session_as("employee"), &Capability::ASSIGN_TASK));
        assert!(!oracle.can(&session_as("super_admin"), &Capability::new("nope")));
    }

    #[test]
    fn explain_missing_capability_lists_granting_roles() {
        let oracle = PermissionOracle::default();
        let explanation = oracle.explain(&session_as("employee"), &Capability::MANAGE_ROLES);

        assert!(!explanation.granted);
        assert_eq!(explanation.denial, Some(DenialKind::MissingCapability));
        assert_eq!(explanation.granting_roles, vec!["admin", "super_admin"]);
        assert!(explanation.effective_capabilities.is_empty());
    }

    #[test]
    fn explain_distinguishes_unknown_capability() {
        let oracle = PermissionOracle::default();
        let explanation = oracle.explain(&session_as("admin"), &Capability::new("teleport"));
        assert_eq!(explanation.denial, Some(DenialKind::UnknownCapability));
    }

    #[test]
    fn explain_granted() {
        let oracle = PermissionOracle::default();
        let explanation = oracle.explain(&session_as("admin"), &Capability::DELETE_CUSTOMER);
        assert!(explanation.granted);
        assert!(explanation.denial.is_none());
        assert!(explanation.effective_capabilities.contains(&"delete_customer".to_string()));
    }
}
