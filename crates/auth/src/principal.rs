use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crmdesk_core::{CompanyId, UserId};

use crate::Role;

/// The signed-in user as the backend describes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// The user's company. Only `id` and `name` are interpreted; the rest of the
/// backend payload is carried through untouched for pages that need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Body of a successful login or "get current user" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user: SessionUser,
    #[serde(default)]
    pub company: Option<Company>,
}

impl SessionPayload {
    pub fn into_session(self) -> Session {
        Session::authenticated(self.user, self.company)
    }
}

/// Process-wide session value.
///
/// Either fully authenticated (user present) or fully empty; there is no way
/// to build a session with a user but without authentication or vice versa.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    identity: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq)]
struct Identity {
    user: SessionUser,
    company: Option<Company>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self { identity: None }
    }

    pub fn authenticated(user: SessionUser, company: Option<Company>) -> Self {
        Self {
            identity: Some(Identity { user, company }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.identity.as_ref().map(|i| &i.user)
    }

    pub fn company(&self) -> Option<&Company> {
        self.identity.as_ref().and_then(|i| i.company.as_ref())
    }

    pub fn role(&self) -> Option<&Role> {
        self.user().map(|u| &u.role)
    }
}

impl Serialize for Session {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Session", 3)?;
        state.serialize_field("user", &self.user())?;
        state.serialize_field("company", &self.company())?;
        state.serialize_field("isAuthenticated", &self.is_authenticated())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME_RESPONSE: &str = r#"{
        "user": {"id": "u-17", "name": "Dana Reyes", "email": "dana@acme.test", "role": "manager"},
        "company": {"id": "c-3", "name": "Acme", "plan": "growth", "seats": 25}
    }"#;

    #[test]
    fn payload_becomes_authenticated_session() {
        let payload: SessionPayload = serde_json::from_str(ME_RESPONSE).unwrap();
        let session = payload.into_session();

        assert!(session.is_authenticated());
        assert_eq!(session.role(), Some(&Role::Manager));
        let company = session.company().unwrap();
        assert_eq!(company.name, "Acme");
        assert_eq!(company.attributes.get("seats"), Some(&Value::from(25)));
    }

    #[test]
    fn company_is_optional() {
        let payload: SessionPayload = serde_json::from_str(
            r#"{"user": {"id": "u-1", "name": "Root", "email": "root@crm.test", "role": "super_admin"}}"#,
        )
        .unwrap();
        let session = payload.into_session();
        assert!(session.company().is_none());
        assert_eq!(session.role(), Some(&Role::SuperAdmin));
    }

    #[test]
    fn unauthenticated_session_has_no_user() {
        let session = Session::unauthenticated();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(session.role().is_none());
        assert_eq!(session, Session::default());
    }

    #[test]
    fn serializes_with_authentication_flag() {
        let json = serde_json::to_value(Session::unauthenticated()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user": null, "company": null, "isAuthenticated": false})
        );
    }
}
