//! Serial executor: one worker, strict FIFO, crash-isolated operations.
//!
//! ## Design
//!
//! - A bounded channel is the only structure shared by producers and the worker
//! - Exactly one run loop consumes it, so at most one operation runs at a time
//! - A full backlog blocks submitters (backpressure); backlog 0 is a rendezvous
//! - Panics inside operations are caught, logged and never reach the loop or callers
//! - Cancellation is cooperative: operations may poll the context they receive
//!
//! ## Components
//!
//! - `SerialExecutor`: lifecycle, run loop and the submission primitives
//! - `join`: one-shot completion used by `join` / `join_timeout`
//! - `ExecutorStats`: counters for executed, faulted and discarded operations
//! - `RunLoopHandle`: launches the run loop on a named thread and waits for it

pub mod join;
pub mod serial;
pub mod stats;
pub mod worker;

mod integration_tests;

pub use serial::SerialExecutor;
pub use serialq_core::{Context, ExecutorError, ExecutorResult, ExecutorState, Operation};
pub use stats::ExecutorStats;
pub use worker::{RunLoopHandle, spawn};
