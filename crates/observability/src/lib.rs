//! Tracing, logging and panic reporting (shared setup).

/// Initialize process-wide observability (tracing/logging + panic capture).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
    panic::install_panic_hook();
}

/// Like [`init`], with an explicit default filter used when `RUST_LOG` is unset.
pub fn init_with_filter(default_filter: &str) {
    tracing::init_with_filter(default_filter);
    panic::install_panic_hook();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Panic capture and reporting.
pub mod panic;

pub use panic::{
    EXIT_GRACE, PANIC_EXIT_CODE, PanicError, PanicReport, exit_on_panic, exit_on_panic_after,
    guard, panic_message, report_panic,
};
