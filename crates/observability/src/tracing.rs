//! Tracing/logging initialization.
//!
//! Every structured log line in the workspace goes through `tracing`: the
//! level is the severity, the `kind` field is the category and any extra
//! key/value pairs ride along as fields.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with `default_filter` when `RUST_LOG` is not set.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
