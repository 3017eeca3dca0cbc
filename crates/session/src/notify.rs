//! User-visible notifications (toasts).

use serde::Serialize;

/// Shown when silent restoration fails on a protected page.
pub const RESTORE_FAILED_MESSAGE: &str = "Session expired, please log in again";

/// Shown when periodic revalidation gets a 401.
pub const REVALIDATION_FAILED_MESSAGE: &str = "Your session has expired. Please log in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Notifier for headless hosts: notifications become log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(notification = message),
            Severity::Warning => tracing::warn!(notification = message),
            Severity::Error => tracing::error!(notification = message),
        }
    }
}
