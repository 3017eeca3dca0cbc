use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::Role;

/// Capability identifier (e.g. "assign_lead").
///
/// Capabilities are opaque strings so new ones can ship in a table update
/// without a client release; the well-known ones are associated constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const MANAGE_ROLES: Capability = Capability(Cow::Borrowed("manage_roles"));
    pub const MANAGE_COMPANIES: Capability = Capability(Cow::Borrowed("manage_companies"));
    pub const MANAGE_EMPLOYEES: Capability = Capability(Cow::Borrowed("manage_employees"));
    pub const MANAGE_BILLING: Capability = Capability(Cow::Borrowed("manage_billing"));
    pub const ASSIGN_TASK: Capability = Capability(Cow::Borrowed("assign_task"));
    pub const ASSIGN_LEAD: Capability = Capability(Cow::Borrowed("assign_lead"));
    pub const DELETE_CUSTOMER: Capability = Capability(Cow::Borrowed("delete_customer"));
    pub const VIEW_REPORTS: Capability = Capability(Cow::Borrowed("view_reports"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single capability → allowed-roles table every page consults.
///
/// Deserializes from a JSON object such as
/// `{"assign_lead": ["super_admin", "admin", "manager"]}`. Unrecognized role
/// names are dropped on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityTable {
    grants: HashMap<Capability, HashSet<Role>>,
}

impl CapabilityTable {
    pub fn empty() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    /// Parse a table shipped as configuration.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut table: CapabilityTable = serde_json::from_str(raw)?;
        table.drop_unrecognized_roles();
        Ok(table)
    }

    /// Builder-style grant; unrecognized roles are ignored.
    pub fn grant<I>(mut self, capability: Capability, roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        let entry = self.grants.entry(capability).or_default();
        entry.extend(roles.into_iter().filter(Role::is_recognized));
        self
    }

    /// Roles allowed to exercise `capability`, or `None` for an unknown capability.
    pub fn allowed_roles(&self, capability: &Capability) -> Option<&HashSet<Role>> {
        self.grants.get(capability)
    }

    /// Table lookup: unknown capability and unrecognized role are both `false`.
    pub fn allows(&self, role: &Role, capability: &Capability) -> bool {
        if !role.is_recognized() {
            return false;
        }
        self.grants
            .get(capability)
            .is_some_and(|roles| roles.contains(role))
    }

    /// Capabilities granted to `role`, sorted for display.
    pub fn capabilities_of(&self, role: &Role) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .grants
            .iter()
            .filter(|(_, roles)| role.is_recognized() && roles.contains(role))
            .map(|(cap, _)| cap.clone())
            .collect();
        caps.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        caps
    }

    fn drop_unrecognized_roles(&mut self) {
        for (capability, roles) in self.grants.iter_mut() {
            roles.retain(|role| {
                let keep = role.is_recognized();
                if !keep {
                    tracing::warn!(
                        capability = capability.as_str(),
                        role = role.as_str(),
                        "dropping unrecognized role from capability table"
                    );
                }
                keep
            });
        }
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        use Role::*;

        Self::empty()
            .grant(Capability::MANAGE_ROLES, [SuperAdmin, Admin])
            .grant(Capability::MANAGE_COMPANIES, [SuperAdmin])
            .grant(Capability::MANAGE_EMPLOYEES, [SuperAdmin, Admin])
            .grant(Capability::MANAGE_BILLING, [SuperAdmin, Admin])
            .grant(Capability::ASSIGN_TASK, [SuperAdmin, Admin, Manager])
            .grant(Capability::ASSIGN_LEAD, [SuperAdmin, Admin, Manager])
            .grant(Capability::DELETE_CUSTOMER, [SuperAdmin, Admin])
            .grant(Capability::VIEW_REPORTS, [SuperAdmin, Admin, Manager])
    }
}
