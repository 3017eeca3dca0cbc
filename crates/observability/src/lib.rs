//! Logging setup shared by every CRMDesk binary.

/// Initialize process-wide logging with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Like [`init`], but with a caller-chosen fallback filter used when
/// `RUST_LOG` is unset (e.g. `"crmdesk_session=debug,info"`).
pub fn init_with_default(filter: &str) {
    tracing::init(filter);
}

/// Tracing subscriber configuration.
pub mod tracing;
