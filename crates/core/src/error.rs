//! Executor error model.

use thiserror::Error;

/// Result type used across the executor crates.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Conditions surfaced to callers of the executor.
///
/// Faults raised by operations are deliberately absent: they are contained
/// inside the run loop and only reach the logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The submission queue was closed by `stop` (or the worker exited).
    #[error("queue closed")]
    QueueClosed,

    /// `run` was called before `initialize`.
    #[error("executor not initialized")]
    NotInitialized,

    /// `initialize` was called on an executor that already has a context.
    #[error("executor already initialized")]
    AlreadyInitialized,

    /// A second run loop tried to consume the same queue.
    #[error("run loop already started")]
    AlreadyRunning,

    /// The executor has been stopped; instances are single use.
    #[error("executor already stopped")]
    AlreadyStopped,

    /// An operation tried to submit work to its own executor.
    #[error("re-entrant submission from the executor's own worker")]
    Reentrant,

    /// The run loop thread died outside of any operation.
    #[error("run loop panicked")]
    WorkerPanicked,

    /// The worker thread could not be spawned.
    #[error("failed to spawn run loop: {0}")]
    Spawn(String),

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl ExecutorError {
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for the errors that mean "this executor will never accept work again".
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::QueueClosed | Self::AlreadyStopped)
    }
}
