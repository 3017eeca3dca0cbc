use serde::{Deserialize, Serialize};

/// Role attached to a session's user.
///
/// The backend sends roles as snake_case strings. Anything the client does not
/// know is kept as [`Role::Unrecognized`] so a newer backend cannot crash an
/// older client; unrecognized roles never satisfy any check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Employee,
    Unrecognized(String),
}

impl Role {
    /// Every role the client understands, most privileged first.
    pub const KNOWN: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Manager, Role::Employee];

    pub fn parse(name: &str) -> Self {
        match name {
            "super_admin" => Role::SuperAdmin,
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            "employee" => Role::Employee,
            other => Role::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
            Role::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }

    /// Position in the privilege order (higher is more privileged).
    ///
    /// Only used for membership/outrank checks, never arithmetic.
    fn rank(&self) -> Option<u8> {
        match self {
            Role::SuperAdmin => Some(3),
            Role::Admin => Some(2),
            Role::Manager => Some(1),
            Role::Employee => Some(0),
            Role::Unrecognized(_) => None,
        }
    }

    /// `true` if `self` equals or outranks `minimum`. Fails closed for
    /// unrecognized roles on either side.
    pub fn is_at_least(&self, minimum: &Role) -> bool {
        match (self.rank(), minimum.rank()) {
            (Some(mine), Some(required)) => mine >= required,
            _ => false,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::parse(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        match value {
            Role::Unrecognized(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
