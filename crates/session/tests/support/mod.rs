#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Notify, oneshot};

use crmdesk_session::{
    AuthApi, AuthError, CredentialKey, CredentialPair, HistoryRouter, LoginRequest, LoginResponse,
    MemoryCredentialStore, Notifier, Router, SessionConfig, SessionController, SessionPayload, Severity,
};

pub const ACCESS: &str = "access-token-1";
pub const REFRESH: &str = "refresh-token-1";

pub fn payload(role: &str) -> SessionPayload {
    serde_json::from_value(json!({
        "user": { "id": "u-42", "name": "Dana", "email": "dana@acme.test", "role": role },
        "company": { "id": "c-7", "name": "Acme", "plan": "pro" }
    }))
    .unwrap()
}

pub fn stored_pair() -> MemoryCredentialStore {
    MemoryCredentialStore::with_entries([
        (CredentialKey::AccessToken, ACCESS),
        (CredentialKey::RefreshToken, REFRESH),
    ])
}

/// Scripted backend. `get_current_user` pops `me_script` first and falls back
/// to `me_default` once the script runs out.
pub struct FakeAuthApi {
    me_script: Mutex<VecDeque<Result<SessionPayload, AuthError>>>,
    me_default: Mutex<Result<SessionPayload, AuthError>>,
    me_hold: Mutex<Option<oneshot::Receiver<()>>>,
    pub me_entered: Notify,
    login_result: Mutex<Result<LoginResponse, AuthError>>,
    refresh_result: Mutex<Result<CredentialPair, AuthError>>,
    logout_result: Mutex<Result<(), AuthError>>,
    logout_delay: Mutex<Option<Duration>>,
    pub seen_credentials: Mutex<Vec<CredentialPair>>,
    pub me_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl FakeAuthApi {
    pub fn answering(role: &str) -> Self {
        Self::with_me(Ok(payload(role)))
    }

    pub fn rejecting(status: u16) -> Self {
        Self::with_me(Err(AuthError::new(status, "rejected")))
    }

    pub fn with_me(me: Result<SessionPayload, AuthError>) -> Self {
        Self {
            me_script: Mutex::new(VecDeque::new()),
            me_default: Mutex::new(me),
            me_hold: Mutex::new(None),
            me_entered: Notify::new(),
            login_result: Mutex::new(Err(AuthError::unauthorized("bad credentials"))),
            refresh_result: Mutex::new(Err(AuthError::unauthorized("refresh rejected"))),
            logout_result: Mutex::new(Ok(())),
            logout_delay: Mutex::new(None),
            seen_credentials: Mutex::new(Vec::new()),
            me_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn then_me(self, result: Result<SessionPayload, AuthError>) -> Self {
        self.me_script.lock().unwrap().push_back(result);
        self
    }

    pub fn set_me_default(&self, result: Result<SessionPayload, AuthError>) {
        *self.me_default.lock().unwrap() = result;
    }

    pub fn with_login(self, result: Result<LoginResponse, AuthError>) -> Self {
        *self.login_result.lock().unwrap() = result;
        self
    }

    pub fn with_refresh(self, result: Result<CredentialPair, AuthError>) -> Self {
        *self.refresh_result.lock().unwrap() = result;
        self
    }

    pub fn with_logout(self, result: Result<(), AuthError>) -> Self {
        *self.logout_result.lock().unwrap() = result;
        self
    }

    /// Logout revokes the session immediately, then takes `delay` to respond.
    pub fn with_slow_logout(self, delay: Duration) -> Self {
        *self.logout_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make the next `get_current_user` wait until the returned sender fires.
    pub fn hold_next_me(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.me_hold.lock().unwrap() = Some(rx);
        tx
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_result.lock().unwrap().clone()
    }

    async fn get_current_user(&self, credentials: &CredentialPair) -> Result<SessionPayload, AuthError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials.lock().unwrap().push(credentials.clone());

        let hold = self.me_hold.lock().unwrap().take();
        self.me_entered.notify_one();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        let scripted = self.me_script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self.me_default.lock().unwrap().clone(),
        }
    }

    async fn logout(&self, _credentials: &CredentialPair) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.set_me_default(Err(AuthError::unauthorized("session revoked")));

        let delay = *self.logout_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.logout_result.lock().unwrap().clone()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<CredentialPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.seen.lock().unwrap().push((message.to_string(), severity));
    }
}

/// Router whose location only changes when the host commits it, like a SPA
/// router that applies navigations on the next frame.
pub struct DeferredRouter {
    location: Mutex<String>,
    navigations: Mutex<Vec<String>>,
}

impl DeferredRouter {
    pub fn at(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_string()),
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

impl Router for DeferredRouter {
    fn current_path(&self) -> String {
        self.location.lock().unwrap().clone()
    }

    fn navigate(&self, path: &str) {
        self.navigations.lock().unwrap().push(path.to_string());
    }
}

pub struct Harness {
    pub api: Arc<FakeAuthApi>,
    pub store: MemoryCredentialStore,
    pub router: Arc<HistoryRouter>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: SessionController,
}

impl Harness {
    pub fn new(start: &str, api: FakeAuthApi, store: MemoryCredentialStore) -> Self {
        Self::with_config(start, api, store, SessionConfig::default())
    }

    pub fn with_config(
        start: &str,
        api: FakeAuthApi,
        store: MemoryCredentialStore,
        config: SessionConfig,
    ) -> Self {
        let api = Arc::new(api);
        let router = Arc::new(HistoryRouter::new(start));
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SessionController::new(
            api.clone(),
            store.clone(),
            router.clone(),
            notifier.clone(),
            config,
        );
        Self {
            api,
            store,
            router,
            notifier,
            controller,
        }
    }

    /// Navigations issued after the starting location.
    pub fn redirects(&self) -> Vec<String> {
        self.router.history().into_iter().skip(1).collect()
    }
}

pub fn period() -> Duration {
    SessionConfig::default().revalidate_every
}
