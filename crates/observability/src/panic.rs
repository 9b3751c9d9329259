//! Recovering from panics without losing the evidence.
//!
//! A panic hook records the backtrace of the panicking frame in thread-local
//! storage; the code that catches the unwind picks it up and logs it together
//! with the panic message. Without the hook the backtrace is captured at the
//! catch site instead, which still shows which worker recovered.
//!
//! [`guard`] keeps the process alive; [`exit_on_panic`] is for code that must
//! not outlive its own failure.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::Once;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::error;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install the backtrace-recording panic hook. Idempotent.
///
/// The previously installed hook keeps running, so the default stderr
/// message is preserved.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_backtrace() -> String {
    LAST_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}

/// What was logged for a recovered panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicReport {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub stacktrace: String,
}

/// Log a recovered panic at ERROR level with its message and stack trace.
pub fn report_panic(kind: &str, title: &str, payload: &(dyn Any + Send)) -> PanicReport {
    let message = panic_message(payload);
    let stacktrace = take_backtrace();

    error!(
        kind,
        err = %format!("recovered from panic: {message}"),
        stacktrace = %stacktrace,
        "panic (err, stacktrace): {title}"
    );

    PanicReport {
        kind: kind.to_string(),
        title: title.to_string(),
        message,
        stacktrace,
    }
}

/// A panic converted into an error value.
///
/// The display form hides the panic message; it is in the logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("panic (details hidden): {title}")]
pub struct PanicError {
    pub title: String,
    pub report: PanicReport,
}

/// Run `f`, turning a panic into a logged [`PanicError`].
pub fn guard<T>(kind: &str, title: &str, f: impl FnOnce() -> T) -> Result<T, PanicError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| PanicError {
        title: title.to_string(),
        report: report_panic(kind, title, payload.as_ref()),
    })
}

/// How long [`exit_on_panic`] waits after logging, so the report can leave
/// the process before it ends.
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Exit status of a process ended by [`exit_on_panic`].
pub const PANIC_EXIT_CODE: i32 = 1;

/// Run `f`; on panic, log the report, wait [`EXIT_GRACE`] and exit the process.
pub fn exit_on_panic<T>(kind: &str, title: &str, f: impl FnOnce() -> T) -> T {
    exit_on_panic_after(kind, title, EXIT_GRACE, f)
}

/// [`exit_on_panic`] with an explicit grace period.
pub fn exit_on_panic_after<T>(
    kind: &str,
    title: &str,
    grace: Duration,
    f: impl FnOnce() -> T,
) -> T {
    match guard(kind, title, f) {
        Ok(value) => value,
        Err(err) => {
            error!(
                kind,
                grace_ms = grace.as_millis() as u64,
                code = PANIC_EXIT_CODE,
                "exiting after panic: {}",
                err.title
            );
            thread::sleep(grace);
            process::exit(PANIC_EXIT_CODE)
        }
    }
}
