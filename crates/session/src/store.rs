//! Durable credential storage and the sanitation pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crmdesk_auth::{CredentialPair, inspect_token};

use crate::state::lock;

/// The two well-known storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 2] = [CredentialKey::AccessToken, CredentialKey::RefreshToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "accessToken",
            CredentialKey::RefreshToken => "refreshToken",
        }
    }
}

impl core::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("credential store io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Durable key-value store holding the credential pair.
///
/// Synchronous on purpose: browser storage and small files both are.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError>;

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: CredentialKey) -> Result<(), StoreError>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for Box<S> {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: CredentialKey) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<Mutex<HashMap<CredentialKey, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw values, including deliberately broken ones.
    pub fn with_entries<I, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CredentialKey, V)>,
        V: Into<String>,
    {
        let store = Self::new();
        {
            let mut map = lock(&store.entries);
            for (key, value) in entries {
                map.insert(key, value.into());
            }
        }
        store
    }

    pub fn contains(&self, key: CredentialKey) -> bool {
        lock(&self.entries).contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<(), StoreError> {
        lock(&self.entries).remove(&key);
        Ok(())
    }
}

/// Store for contexts without durable storage (server-side rendering, CLI
/// probes without a data dir). Reads are empty, writes vanish.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCredentialStore;

impl CredentialStore for NullCredentialStore {
    fn get(&self, _key: CredentialKey) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, key: CredentialKey, _value: &str) -> Result<(), StoreError> {
        tracing::debug!(%key, "discarding credential write: no durable store");
        Ok(())
    }

    fn remove(&self, _key: CredentialKey) -> Result<(), StoreError> {
        Ok(())
    }
}

/// JSON file store (`{"accessToken": ..., "refreshToken": ...}`).
///
/// Writes go to a sibling temp file and are renamed into place. A corrupt file
/// reads as an error and is replaced by the next write or removal.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// `<data dir>/crmdesk/credentials.json`, if the platform has a data dir.
    pub fn default_location() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("crmdesk").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CredentialPair, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(CredentialPair::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CredentialPair::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn load_for_update(&self) -> Result<CredentialPair, StoreError> {
        match self.load() {
            Err(StoreError::Corrupt(err)) => {
                tracing::warn!(path = %self.path.display(), "replacing corrupt credential file: {err}");
                Ok(CredentialPair::default())
            }
            other => other,
        }
    }

    fn persist(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        if pair.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err).with_context(|| format!("failed to delete {:?}", self.path)),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create credential directory at {:?}", parent))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(pair).context("failed to encode credentials")?;
        std::fs::write(&tmp, body).with_context(|| format!("failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move credentials into {:?}", self.path))?;
        Ok(())
    }

    fn update(&self, key: CredentialKey, value: Option<&str>) -> Result<(), StoreError> {
        let _guard = lock(&self.guard);
        let mut pair = self.load_for_update()?;
        let slot = match key {
            CredentialKey::AccessToken => &mut pair.access_token,
            CredentialKey::RefreshToken => &mut pair.refresh_token,
        };
        *slot = value.map(str::to_string);
        self.persist(&pair)
            .map_err(|err| StoreError::Unavailable(format!("{err:#}")))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, StoreError> {
        let _guard = lock(&self.guard);
        let pair = self.load()?;
        Ok(match key {
            CredentialKey::AccessToken => pair.access_token,
            CredentialKey::RefreshToken => pair.refresh_token,
        })
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StoreError> {
        self.update(key, Some(value))
    }

    fn remove(&self, key: CredentialKey) -> Result<(), StoreError> {
        self.update(key, None)
    }
}

/// Read both keys. Unreadable entries are logged and treated as absent.
pub(crate) fn read_credentials(store: &dyn CredentialStore) -> CredentialPair {
    let read = |key: CredentialKey| match store.get(key) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%key, "failed to read stored credential: {err}");
            None
        }
    };

    CredentialPair {
        access_token: read(CredentialKey::AccessToken),
        refresh_token: read(CredentialKey::RefreshToken),
    }
}

/// Remove both keys, logging (not propagating) failures.
pub(crate) fn erase_credentials(store: &dyn CredentialStore) {
    for key in CredentialKey::ALL {
        if let Err(err) = store.remove(key) {
            tracing::error!(%key, "failed to delete stored credential: {err}");
        }
    }
}

/// What a sanitation pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitationReport {
    pub removed: Vec<(CredentialKey, String)>,
}

impl SanitationReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Delete every stored token that is structurally unusable at `now`.
///
/// Never fails: removal errors are logged and the key is reported as kept.
/// Running it twice on the same state removes nothing the second time.
pub fn sanitize_credentials(store: &dyn CredentialStore, now: DateTime<Utc>) -> SanitationReport {
    let mut report = SanitationReport::default();

    for key in CredentialKey::ALL {
        let reason = match store.get(key) {
            Ok(None) => continue,
            Ok(Some(raw)) => match inspect_token(&raw, now) {
                Ok(()) => continue,
                Err(defect) => defect.to_string(),
            },
            Err(StoreError::Corrupt(err)) => format!("unreadable entry: {err}"),
            Err(err) => {
                tracing::warn!(%key, "skipping sanitation of unreadable credential: {err}");
                continue;
            }
        };

        match store.remove(key) {
            Ok(()) => {
                tracing::debug!(%key, %reason, "removed unusable stored credential");
                report.removed.push((key, reason));
            }
            Err(err) => tracing::error!(%key, "failed to remove unusable credential: {err}"),
        }
    }

    report
}
