//! The session controller: restoration, invalidation, logout and role/route
//! reconciliation.
//!
//! All writes to the session and to the stored credentials go through here.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crmdesk_auth::{CredentialPair, PermissionOracle, Role, Session};

use crate::api::{AuthApi, AuthError, AuthFailure, LoginRequest};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::notify::{Notifier, RESTORE_FAILED_MESSAGE, REVALIDATION_FAILED_MESSAGE, Severity};
use crate::revalidation::{self, TimerSlot};
use crate::router::Router;
use crate::routes::{RouteClass, normalize_path, reconcile_redirect};
use crate::state::{Lifecycle, SessionCell, SessionReader, lock};
use crate::store::{CredentialKey, CredentialStore, StoreError, erase_credentials, read_credentials, sanitize_credentials};

/// What one `initialize_session` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitOutcome {
    /// Public page and no session: nothing attempted.
    Skipped,
    /// A session already existed; `redirect` is set if reconciliation moved the user.
    Active { redirect: Option<String> },
    /// Another call is restoring right now.
    RestoreInFlight,
    /// Restoration already ran once for this client and did not produce a session.
    RestoreAlreadyAttempted,
    /// Stored credentials produced a session.
    Restored { redirect: Option<String> },
    /// The backend rejected the stored credentials; they are gone.
    Invalidated { redirected: bool },
    /// A transient failure; credentials kept, no session, no redirect.
    Deferred,
    /// Non-public page, no session, nothing stored.
    LoginRequired { redirected: bool },
    /// A login or logout overtook this restoration; its result was dropped.
    Superseded,
}

#[derive(Debug)]
struct Progress {
    lifecycle: Lifecycle,
    restore_attempted: bool,
    /// Set by logout, cleared when a session is published again.
    signed_out: bool,
}

enum RestoreGate {
    Start(u64),
    InFlight,
    AlreadyAttempted,
    NothingStored,
}

pub(crate) struct Inner {
    pub(crate) api: Arc<dyn AuthApi>,
    pub(crate) store: Box<dyn CredentialStore>,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: SessionConfig,
    pub(crate) cell: SessionCell,
    pub(crate) timer: Mutex<Option<TimerSlot>>,
    pub(crate) timer_generation: AtomicU64,
    oracle: PermissionOracle,
    progress: Mutex<Progress>,
    reconciled: Mutex<Option<(Role, String)>>,
    logout_gate: tokio::sync::Mutex<()>,
}

/// Owner of the client's authentication lifecycle. Cheap to clone; clones
/// share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new<S>(
        api: Arc<dyn AuthApi>,
        store: S,
        router: Arc<dyn Router>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self
    where
        S: CredentialStore + 'static,
    {
        let oracle = PermissionOracle::new(config.capabilities.clone());
        Self {
            inner: Arc::new(Inner {
                api,
                store: Box::new(store),
                router,
                notifier,
                config,
                cell: SessionCell::new(),
                timer: Mutex::new(None),
                timer_generation: AtomicU64::new(0),
                oracle,
                progress: Mutex::new(Progress {
                    lifecycle: Lifecycle::Uninitialized,
                    restore_attempted: false,
                    signed_out: false,
                }),
                reconciled: Mutex::new(None),
                logout_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner.progress).lifecycle
    }

    pub fn session(&self) -> Session {
        self.inner.cell.snapshot()
    }

    /// Read-only view for pages (snapshot, change notification, permissions).
    pub fn reader(&self) -> SessionReader {
        self.inner.cell.reader(self.inner.oracle.clone())
    }

    pub fn oracle(&self) -> &PermissionOracle {
        &self.inner.oracle
    }

    /// Generation number of the running revalidation timer, if any.
    pub fn active_timer(&self) -> Option<u64> {
        self.inner.active_timer()
    }

    /// Decide, for the location `current_path`, whether to do nothing,
    /// restore the session silently, or send the user to login.
    ///
    /// Safe to call on every location change: restoration runs at most once
    /// per controller, and concurrent calls while it is in flight return
    /// [`InitOutcome::RestoreInFlight`] without touching the backend.
    pub async fn initialize_session(&self, current_path: &str) -> InitOutcome {
        let inner = &self.inner;

        let report = sanitize_credentials(inner.store.as_ref(), Utc::now());
        if !report.is_clean() {
            info!(removed = report.removed.len(), "discarded unusable stored credentials");
        }

        let session = inner.cell.snapshot();
        if let Some(role) = session.role() {
            let redirect = inner.reconcile(role, current_path);
            return InitOutcome::Active { redirect };
        }

        if inner.config.routes.classify(current_path) == RouteClass::Public {
            debug!(path = current_path, "public page without a session; not restoring");
            return InitOutcome::Skipped;
        }

        let credentials = read_credentials(inner.store.as_ref());
        match inner.begin_restore(&credentials) {
            RestoreGate::Start(epoch) => inner.restore(credentials, epoch).await,
            RestoreGate::InFlight => InitOutcome::RestoreInFlight,
            RestoreGate::AlreadyAttempted => InitOutcome::RestoreAlreadyAttempted,
            RestoreGate::NothingStored => {
                debug!(path = current_path, "no session and no stored credentials");
                let redirected = inner.redirect(&inner.config.routes.login_path);
                InitOutcome::LoginRequired { redirected }
            }
        }
    }

    /// Per-navigation entry point: initialize, then keep exactly one
    /// revalidation timer while an authenticated user is on a non-public page.
    pub async fn handle_location_change(&self, path: &str) -> InitOutcome {
        let outcome = self.initialize_session(path).await;

        let current = self.inner.router.current_path();
        let wants_timer =
            !self.inner.config.routes.is_public(&current) && self.inner.cell.is_authenticated();
        if !wants_timer {
            self.teardown();
        } else if self.active_timer().is_none() {
            self.start_periodic_revalidation();
        }

        outcome
    }

    /// Start revalidating every `revalidate_every`. Replaces any running timer.
    ///
    /// Returns `false` (and starts nothing) on a public page, without an
    /// authenticated session, or outside an async runtime.
    pub fn start_periodic_revalidation(&self) -> bool {
        let path = self.inner.router.current_path();
        if self.inner.config.routes.is_public(&path) {
            debug!(%path, "not revalidating on a public page");
            return false;
        }
        if !self.inner.cell.is_authenticated() {
            debug!("not revalidating without a session");
            return false;
        }
        revalidation::install(&self.inner).is_some()
    }

    /// Cancel the revalidation timer. Idempotent.
    pub fn teardown(&self) -> bool {
        self.inner.cancel_timer()
    }

    /// Log in and become the session's source of truth.
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, SessionError> {
        let inner = &self.inner;

        let response = inner.api.login(request).await.map_err(SessionError::Login)?;
        inner.persist_credentials(&response.credentials())?;

        let session = response.payload.into_session();
        inner.cell.replace(session.clone());
        {
            let mut progress = lock(&inner.progress);
            progress.lifecycle = Lifecycle::Authenticated;
            progress.restore_attempted = true;
            progress.signed_out = false;
        }
        *lock(&inner.reconciled) = None;

        if let Some(role) = session.role() {
            info!(%role, "logged in");
            inner.redirect(inner.config.routes.home_for(role));
        }
        Ok(session)
    }

    /// Local cleanup first (session, credentials, timer), then a best-effort
    /// backend logout and a redirect to login. Calling it again is harmless.
    ///
    /// The timer is gone and the epoch has moved before the backend call
    /// starts; a revalidation tick racing the logout drops its result.
    pub async fn logout(&self) {
        let inner = &self.inner;
        let _gate = inner.logout_gate.lock().await;

        let credentials = read_credentials(inner.store.as_ref());
        let already_signed_out = std::mem::replace(&mut lock(&inner.progress).signed_out, true);
        inner.clear_local();

        if let Err(err) = inner.api.logout(&credentials).await {
            warn!(status = err.status_code, "backend logout failed; cleared locally anyway: {err}");
        }

        if already_signed_out {
            debug!("already signed out; login redirect already issued");
            return;
        }
        info!("logged out");
        inner.redirect(&inner.config.routes.login_path);
    }

    /// Exchange the stored refresh token for a new credential pair.
    ///
    /// A 401 ends the session exactly like a failed revalidation.
    pub async fn refresh_credentials(&self) -> Result<CredentialPair, SessionError> {
        let inner = &self.inner;

        let stored = read_credentials(inner.store.as_ref());
        let refresh_token = stored.refresh_token.ok_or(SessionError::NoRefreshToken)?;
        let epoch = inner.cell.epoch();

        match inner.api.refresh(&refresh_token).await {
            Ok(pair) => {
                if inner.cell.epoch() != epoch {
                    return Err(SessionError::Superseded);
                }
                let pair = with_previous_refresh(pair, refresh_token);
                inner.persist_credentials(&pair)?;
                debug!("credentials refreshed");
                Ok(pair)
            }
            Err(err) if err.failure() == AuthFailure::Unauthenticated => {
                if inner.cell.epoch() == epoch {
                    inner.invalidate(REVALIDATION_FAILED_MESSAGE, Severity::Error);
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Inner {
    fn begin_restore(&self, credentials: &CredentialPair) -> RestoreGate {
        let mut progress = lock(&self.progress);
        if progress.lifecycle == Lifecycle::Restoring {
            return RestoreGate::InFlight;
        }
        if credentials.is_empty() {
            if progress.lifecycle == Lifecycle::Uninitialized {
                progress.lifecycle = Lifecycle::Unauthenticated;
            }
            return RestoreGate::NothingStored;
        }
        if progress.restore_attempted {
            return RestoreGate::AlreadyAttempted;
        }
        progress.restore_attempted = true;
        progress.lifecycle = Lifecycle::Restoring;
        RestoreGate::Start(self.cell.epoch())
    }

    async fn restore(&self, mut credentials: CredentialPair, epoch: u64) -> InitOutcome {
        info!("restoring session from stored credentials");

        if credentials.access_token.is_none() {
            if let Some(refresh_token) = credentials.refresh_token.clone() {
                match self.api.refresh(&refresh_token).await {
                    Ok(pair) => {
                        if self.cell.epoch() != epoch {
                            return InitOutcome::Superseded;
                        }
                        credentials = with_previous_refresh(pair, refresh_token);
                        if let Err(err) = self.persist_credentials(&credentials) {
                            warn!("failed to store refreshed credentials: {err}");
                        }
                    }
                    Err(err) => return self.restore_failed(err, epoch),
                }
            }
        }

        match self.api.get_current_user(&credentials).await {
            Ok(payload) => {
                let session = payload.into_session();
                let role = session.role().cloned();
                if !self.cell.publish_if_current(epoch, session) {
                    debug!("session changed during restoration; dropping result");
                    return InitOutcome::Superseded;
                }
                self.set_lifecycle(Lifecycle::Authenticated);

                let path = self.router.current_path();
                let redirect = role.and_then(|role| {
                    info!(%role, "session restored");
                    self.reconcile(&role, &path)
                });
                InitOutcome::Restored { redirect }
            }
            Err(err) => self.restore_failed(err, epoch),
        }
    }

    fn restore_failed(&self, err: AuthError, epoch: u64) -> InitOutcome {
        if self.cell.epoch() != epoch {
            debug!("session changed during restoration; ignoring failure");
            return InitOutcome::Superseded;
        }

        let clears = match err.failure() {
            AuthFailure::Unauthenticated => true,
            AuthFailure::Unreachable => self.config.unreachable_clears_session,
            AuthFailure::Transient => false,
        };
        if !clears {
            warn!(status = err.status_code, "session restoration failed; keeping stored credentials: {err}");
            self.set_lifecycle(Lifecycle::Unauthenticated);
            return InitOutcome::Deferred;
        }

        info!(status = err.status_code, "stored credentials rejected; clearing session");
        let redirected = self.invalidate(RESTORE_FAILED_MESSAGE, Severity::Warning);
        InitOutcome::Invalidated { redirected }
    }

    /// Clear everything, then warn and redirect unless the user is on a
    /// public page. Returns whether a redirect was issued.
    pub(crate) fn invalidate(&self, message: &str, severity: Severity) -> bool {
        self.clear_local();

        let path = self.router.current_path();
        if self.config.routes.is_public(&path) {
            debug!(%path, "session invalidated on a public page; staying silent");
            return false;
        }
        self.notifier.notify(message, severity);
        self.redirect(&self.config.routes.login_path)
    }

    fn clear_local(&self) {
        self.cell.clear();
        erase_credentials(self.store.as_ref());
        self.set_lifecycle(Lifecycle::Unauthenticated);
        *lock(&self.reconciled) = None;
        self.cancel_timer();
    }

    /// Role vs. area check, run once per distinct `(role, path)`.
    fn reconcile(&self, role: &Role, path: &str) -> Option<String> {
        let key = (role.clone(), normalize_path(path).to_string());
        {
            let mut last = lock(&self.reconciled);
            if last.as_ref() == Some(&key) {
                return None;
            }
            *last = Some(key);
        }

        let class = self.config.routes.classify(path);
        let target = reconcile_redirect(&self.config.routes, role, class)?;
        info!(%role, from = path, to = target, "role does not match area; redirecting");
        self.redirect(target).then(|| target.to_string())
    }

    /// Navigate unless already there.
    fn redirect(&self, target: &str) -> bool {
        let current = self.router.current_path();
        if normalize_path(&current) == normalize_path(target) {
            return false;
        }
        self.router.navigate(target);
        true
    }

    fn persist_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        for (key, value) in [
            (CredentialKey::AccessToken, &pair.access_token),
            (CredentialKey::RefreshToken, &pair.refresh_token),
        ] {
            match value {
                Some(token) => self.store.set(key, token)?,
                None => self.store.remove(key)?,
            }
        }
        Ok(())
    }

    fn set_lifecycle(&self, lifecycle: Lifecycle) {
        let mut progress = lock(&self.progress);
        if lifecycle == Lifecycle::Authenticated {
            progress.signed_out = false;
        }
        if progress.lifecycle != lifecycle {
            debug!(from = ?progress.lifecycle, to = ?lifecycle, "session lifecycle");
            progress.lifecycle = lifecycle;
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slot.take() {
            slot.abort();
        }
    }
}

/// Backends that do not rotate refresh tokens omit them from the response.
fn with_previous_refresh(mut pair: CredentialPair, previous: String) -> CredentialPair {
    if pair.refresh_token.is_none() {
        pair.refresh_token = Some(previous);
    }
    pair
}
