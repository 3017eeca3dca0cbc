//! Shared session state: one writer, many readers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crmdesk_auth::{AuthorizationExplanation, Capability, PermissionOracle, Role, Session};

/// Lock a std mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate is a plain field update, so the data
/// is consistent even after a poisoning panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the controller is in the per-client session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Uninitialized,
    Restoring,
    Authenticated,
    Unauthenticated,
}

/// Write side of the session. Only the controller holds one.
///
/// `epoch` increases on every authoritative change (login, clear) so an async
/// result that started before the change can tell it is stale.
#[derive(Debug)]
pub(crate) struct SessionCell {
    tx: watch::Sender<Session>,
    epoch: AtomicU64,
}

impl SessionCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::unauthenticated());
        Self {
            tx,
            epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Publish a session from an authoritative source (login).
    pub(crate) fn replace(&self, session: Session) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.tx.send_replace(session);
    }

    /// Publish a restored session only if nothing replaced or cleared the
    /// session since `epoch` was read.
    pub(crate) fn publish_if_current(&self, epoch: u64, session: Session) -> bool {
        self.tx.send_if_modified(|current| {
            if self.epoch.load(Ordering::Acquire) != epoch {
                return false;
            }
            *current = session;
            true
        })
    }

    pub(crate) fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.tx.send_replace(Session::unauthenticated());
    }

    pub(crate) fn reader(&self, oracle: PermissionOracle) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
            oracle,
        }
    }
}

/// Read-only handle pages use to look at the session and ask permission
/// questions. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<Session>,
    oracle: PermissionOracle,
}

impl SessionReader {
    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    pub fn role(&self) -> Option<Role> {
        self.rx.borrow().role().cloned()
    }

    pub fn has_role(&self, required: &Role) -> bool {
        self.oracle.has_role(&self.rx.borrow(), required)
    }

    pub fn has_role_at_least(&self, minimum: &Role) -> bool {
        self.oracle.has_role_at_least(&self.rx.borrow(), minimum)
    }

    pub fn can(&self, capability: &Capability) -> bool {
        self.oracle.can(&self.rx.borrow(), capability)
    }

    pub fn explain(&self, capability: &Capability) -> AuthorizationExplanation {
        self.oracle.explain(&self.rx.borrow(), capability)
    }

    /// Wait for the next session change. Returns `false` once the controller
    /// is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
