//! Route classification and the role/route reconciliation rule.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crmdesk_auth::Role;

/// Access area a path belongs to. Exactly one applies to every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Marketing and auth pages; no session needed.
    Public,
    /// The super-admin panel.
    Privileged,
    /// Everything else; any authenticated role.
    Protected,
}

/// Static routing configuration the classification is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RouteTable {
    /// Exact public paths.
    pub public_paths: BTreeSet<String>,
    /// Public subtrees, matched on whole segments (`/blog` covers `/blog/x`).
    pub public_prefixes: Vec<String>,
    /// Root of the privileged area, matched on whole segments.
    pub privileged_prefix: String,
    pub login_path: String,
    pub protected_root: String,
    pub privileged_root: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        let public_paths = [
            "/",
            "/login",
            "/register",
            "/signup",
            "/forgot-password",
            "/reset-password",
            "/about",
            "/contact",
            "/pricing",
            "/features",
            "/privacy",
            "/terms",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            public_paths,
            public_prefixes: vec!["/blog".to_string(), "/reset-password".to_string()],
            privileged_prefix: "/super-admin".to_string(),
            login_path: "/login".to_string(),
            protected_root: "/dashboard".to_string(),
            privileged_root: "/super-admin".to_string(),
        }
    }
}

impl RouteTable {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Classify a location. Query strings, fragments and trailing slashes are
    /// ignored; the privileged prefix wins over any public rule.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);

        if under_prefix(path, &self.privileged_prefix) {
            return RouteClass::Privileged;
        }
        if self.public_paths.contains(path)
            || self.public_prefixes.iter().any(|p| under_prefix(path, p))
        {
            return RouteClass::Public;
        }
        RouteClass::Protected
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Public
    }

    /// Landing page after login for `role`.
    pub fn home_for(&self, role: &Role) -> &str {
        if *role == Role::SuperAdmin {
            self.privileged_root.as_str()
        } else {
            self.protected_root.as_str()
        }
    }
}

/// Where a user with `role` must be sent from an area of class `class`, if anywhere.
///
/// - `super_admin` on a protected page → privileged root
/// - anyone else on a privileged page → protected root
pub fn reconcile_redirect<'a>(routes: &'a RouteTable, role: &Role, class: RouteClass) -> Option<&'a str> {
    match (role, class) {
        (Role::SuperAdmin, RouteClass::Protected) => Some(routes.privileged_root.as_str()),
        (Role::SuperAdmin, _) => None,
        (_, RouteClass::Privileged) => Some(routes.protected_root.as_str()),
        _ => None,
    }
}

/// Strip query/fragment and trailing slashes; the root stays `/`.
pub(crate) fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = normalize_path(prefix);
    if prefix == "/" {
        return false;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_default_areas() {
        let routes = RouteTable::default();
        assert_eq!(routes.classify("/contact"), RouteClass::Public);
        assert_eq!(routes.classify("/"), RouteClass::Public);
        assert_eq!(routes.classify("/blog/2024/launch"), RouteClass::Public);
        assert_eq!(routes.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(routes.classify("/customers/42/edit"), RouteClass::Protected);
        assert_eq!(routes.classify("/super-admin"), RouteClass::Privileged);
        assert_eq!(routes.classify("/super-admin/companies"), RouteClass::Privileged);
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let routes = RouteTable::default();
        assert_eq!(routes.classify("/super-administrators"), RouteClass::Protected);
        assert_eq!(routes.classify("/blogroll"), RouteClass::Protected);
    }

    #[test]
    fn ignores_query_fragment_and_trailing_slash() {
        let routes = RouteTable::default();
        assert_eq!(routes.classify("/login?next=/dashboard"), RouteClass::Public);
        assert_eq!(routes.classify("/pricing/#plans"), RouteClass::Public);
        assert_eq!(routes.classify("/super-admin/"), RouteClass::Privileged);
        assert_eq!(normalize_path("/leads///"), "/leads");
        assert_eq!(normalize_path("?x=1"), "/");
    }

    #[test]
    fn reconciliation_rules() {
        let routes = RouteTable::default();
        assert_eq!(
            reconcile_redirect(&routes, &Role::SuperAdmin, RouteClass::Protected),
            Some("/super-admin")
        );
        assert_eq!(reconcile_redirect(&routes, &Role::SuperAdmin, RouteClass::Privileged), None);
        assert_eq!(
            reconcile_redirect(&routes, &Role::Employee, RouteClass::Privileged),
            Some("/dashboard")
        );
        assert_eq!(reconcile_redirect(&routes, &Role::Admin, RouteClass::Protected), None);
        assert_eq!(
            reconcile_redirect(&routes, &Role::parse("auditor"), RouteClass::Privileged),
            Some("/dashboard")
        );
        assert_eq!(reconcile_redirect(&routes, &Role::Manager, RouteClass::Public), None);
    }

    #[test]
    fn home_depends_on_role() {
        let routes = RouteTable::default();
        assert_eq!(routes.home_for(&Role::SuperAdmin), "/super-admin");
        assert_eq!(routes.home_for(&Role::Manager), "/dashboard");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let routes = RouteTable::from_json(r#"{"privileged_prefix": "/platform", "privileged_root": "/platform"}"#)
            .unwrap();
        assert_eq!(routes.classify("/platform/tenants"), RouteClass::Privileged);
        assert_eq!(routes.classify("/super-admin"), RouteClass::Protected);
        assert_eq!(routes.login_path, "/login");
    }

    proptest! {
        #[test]
        fn privileged_subtree_is_never_public(tail in "[a-z0-9/-]{0,24}") {
            let routes = RouteTable::default();
            let path = format!("/super-admin/{tail}");
            prop_assert_eq!(routes.classify(&path), RouteClass::Privileged);
        }

        #[test]
        fn query_strings_never_change_the_class(path in "/[a-z-]{0,12}", query in "[a-z=&]{0,12}") {
            let routes = RouteTable::default();
            prop_assert_eq!(routes.classify(&path), routes.classify(&format!("{path}?{query}")));
        }
    }
}
