//! Restore the stored session once against a live backend and print what
//! the controller decided.
//!
//! Usage: `crmdesk-session-probe [path]` (default `/dashboard`).

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;

use crmdesk_session::{
    CredentialStore, FileCredentialStore, HistoryRouter, HttpAuthApi, NullCredentialStore,
    Router, SessionConfig, SessionController, TracingNotifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crmdesk_observability::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "/dashboard".to_string());
    let config = SessionConfig::from_env()?;

    let store: Box<dyn CredentialStore> = match config
        .credentials_path
        .clone()
        .or_else(FileCredentialStore::default_location)
    {
        Some(location) => Box::new(FileCredentialStore::new(location)),
        None => {
            tracing::warn!("no data directory; running without stored credentials");
            Box::new(NullCredentialStore)
        }
    };

    let api = HttpAuthApi::new(config.api_url.clone(), config.request_timeout)
        .context("failed to build HTTP client")?;
    let router = Arc::new(HistoryRouter::new(path.clone()));
    let controller = SessionController::new(
        Arc::new(api),
        store,
        router.clone(),
        Arc::new(TracingNotifier),
        config,
    );

    let outcome = controller.handle_location_change(&path).await;
    controller.teardown();

    let report = json!({
        "outcome": outcome,
        "lifecycle": controller.lifecycle(),
        "session": controller.session(),
        "path": router.current_path(),
        "history": router.history(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
