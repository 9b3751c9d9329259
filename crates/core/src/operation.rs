//! The unit of work accepted by an executor.

/// Execution context handed to every operation.
///
/// Cancellation is cooperative: an operation that never polls
/// [`Context::is_cancelled`] runs to completion even after the executor stops.
pub type Context = tokio_util::sync::CancellationToken;

/// An opaque unit of work.
///
/// Operations are never inspected or compared; the executor only sequences
/// and invokes them. Results travel out-of-band (captured channels, shared
/// state), which is how the join wrappers report completion.
pub type Operation = Box<dyn FnOnce(&Context) + Send + 'static>;
