//! Session controller configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crmdesk_auth::CapabilityTable;

use crate::routes::RouteTable;

/// Every knob of the session controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend base URL (used by [`crate::HttpAuthApi`]).
    pub api_url: String,
    /// How often an authenticated session on a non-public page is revalidated.
    pub revalidate_every: Duration,
    /// Per-request timeout for auth calls.
    pub request_timeout: Duration,
    /// Whether an unreachable backend (status 0) during restoration clears
    /// the stored credentials like a 401 does.
    pub unreachable_clears_session: bool,
    /// Override for the credential file location.
    pub credentials_path: Option<PathBuf>,
    pub routes: RouteTable,
    pub capabilities: CapabilityTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            revalidate_every: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(15),
            unreachable_clears_session: true,
            credentials_path: None,
            routes: RouteTable::default(),
            capabilities: CapabilityTable::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_revalidate_every(mut self, every: Duration) -> Self {
        self.revalidate_every = every;
        self
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_unreachable_clears_session(mut self, clears: bool) -> Self {
        self.unreachable_clears_session = clears;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Recognized keys:
    ///
    /// - `CRMDESK_API_URL`
    /// - `CRMDESK_REVALIDATE_SECS`
    /// - `CRMDESK_REQUEST_TIMEOUT_SECS`
    /// - `CRMDESK_UNREACHABLE_CLEARS_SESSION`
    /// - `CRMDESK_CREDENTIALS_PATH`
    /// - `CRMDESK_ROUTES_FILE` (JSON [`RouteTable`])
    /// - `CRMDESK_CAPABILITIES_FILE` (JSON [`CapabilityTable`])
    ///
    /// Unparseable numbers and booleans fall back to defaults with a warning;
    /// unreadable table files are errors.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CRMDESK_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_or_warn::<u64>(&lookup, "CRMDESK_REVALIDATE_SECS") {
            if secs == 0 {
                tracing::warn!("CRMDESK_REVALIDATE_SECS must be positive; keeping default");
            } else {
                config.revalidate_every = Duration::from_secs(secs);
            }
        }
        if let Some(secs) = parse_or_warn::<u64>(&lookup, "CRMDESK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(clears) = parse_or_warn::<bool>(&lookup, "CRMDESK_UNREACHABLE_CLEARS_SESSION") {
            config.unreachable_clears_session = clears;
        }
        if let Some(path) = lookup("CRMDESK_CREDENTIALS_PATH") {
            config.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("CRMDESK_ROUTES_FILE") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read route table at {path}"))?;
            config.routes = RouteTable::from_json(&raw)
                .with_context(|| format!("invalid route table in {path}"))?;
        }
        if let Some(path) = lookup("CRMDESK_CAPABILITIES_FILE") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read capability table at {path}"))?;
            config.capabilities = CapabilityTable::from_json(&raw)
                .with_context(|| format!("invalid capability table in {path}"))?;
        }

        Ok(config)
    }
}

fn parse_or_warn<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crmdesk_auth::{Capability, Role};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = SessionConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.revalidate_every, Duration::from_secs(300));
        assert!(config.unreachable_clears_session);
        assert_eq!(config.routes, RouteTable::default());
    }

    #[test]
    fn reads_overrides() {
        let config = SessionConfig::from_lookup(lookup_from(&[
            ("CRMDESK_API_URL", "https://crm.example.com/api/"),
            ("CRMDESK_REVALIDATE_SECS", "60"),
            ("CRMDESK_UNREACHABLE_CLEARS_SESSION", "false"),
            ("CRMDESK_CREDENTIALS_PATH", "/tmp/creds.json"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://crm.example.com/api");
        assert_eq!(config.revalidate_every, Duration::from_secs(60));
        assert!(!config.unreachable_clears_session);
        assert_eq!(config.credentials_path, Some(PathBuf::from("/tmp/creds.json")));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let config = SessionConfig::from_lookup(lookup_from(&[
            ("CRMDESK_REVALIDATE_SECS", "soon"),
            ("CRMDESK_UNREACHABLE_CLEARS_SESSION", "maybe"),
        ]))
        .unwrap();
        assert_eq!(config.revalidate_every, Duration::from_secs(300));
        assert!(config.unreachable_clears_session);

        let zero = SessionConfig::from_lookup(lookup_from(&[("CRMDESK_REVALIDATE_SECS", "0")])).unwrap();
        assert_eq!(zero.revalidate_every, Duration::from_secs(300));
    }

    #[test]
    fn loads_capability_table_file() {
        let path = std::env::temp_dir().join(format!("crmdesk-caps-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"export_contacts": ["manager"]}"#).unwrap();

        let path_str = path.to_string_lossy().to_string();
        let config =
            SessionConfig::from_lookup(lookup_from(&[("CRMDESK_CAPABILITIES_FILE", path_str.as_str())])).unwrap();

        assert!(config.capabilities.allows(&Role::Manager, &Capability::new("export_contacts")));
        assert!(!config.capabilities.allows(&Role::Admin, &Capability::MANAGE_ROLES));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_table_file_is_an_error() {
        let result = SessionConfig::from_lookup(lookup_from(&[(
            "CRMDESK_ROUTES_FILE",
            "/definitely/not/here/routes.json",
        )]));
        assert!(result.is_err());
    }
}
