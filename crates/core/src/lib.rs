//! `serialq-core` — shared primitives for the serial executor.
//!
//! Pure types only: identifiers, lifecycle state, the operation shape and the
//! error model. No threads, channels or logging live here.

pub mod error;
pub mod id;
pub mod operation;
pub mod state;

pub use error::{ExecutorError, ExecutorResult};
pub use id::ExecutorId;
pub use operation::{Context, Operation};
pub use state::ExecutorState;
