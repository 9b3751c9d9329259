//! Launching the run loop on its own thread.

use std::sync::Arc;
use std::thread;

use tracing::info;

use serialq_core::{ExecutorError, ExecutorResult};
use serialq_observability as observability;

use crate::serial::SerialExecutor;

/// Handle to control and join a running executor loop.
#[derive(Debug)]
pub struct RunLoopHandle {
    executor: Arc<SerialExecutor>,
    join: Option<thread::JoinHandle<ExecutorResult<()>>>,
}

/// Spawn the run loop on a dedicated, named thread.
///
/// The receiver is claimed here, before the thread exists, so a missing
/// `initialize` fails at the call site and a `stop` issued right after
/// `spawn` returns is seen by the loop as an ordinary shutdown.
pub fn spawn(executor: Arc<SerialExecutor>) -> ExecutorResult<RunLoopHandle> {
    let claim = executor.claim()?;

    let worker = executor.clone();
    let join = thread::Builder::new()
        .name(format!("serialq-{}", executor.name()))
        .spawn(move || {
            worker.run_with(claim);
            Ok(())
        })
        .map_err(|e| {
            // The claim went down with the closure; nothing can consume the
            // queue any more.
            let _ = executor.stop();
            ExecutorError::spawn(e.to_string())
        })?;

    info!(executor = %executor.name(), id = %executor.id(), "run loop spawned");

    Ok(RunLoopHandle {
        executor,
        join: Some(join),
    })
}

impl RunLoopHandle {
    pub fn executor(&self) -> &Arc<SerialExecutor> {
        &self.executor
    }

    /// True once the run loop has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Wait for the run loop to exit.
    pub fn join(mut self) -> ExecutorResult<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        join.join().map_err(|payload| {
            observability::report_panic("queue", self.executor.name(), payload.as_ref());
            ExecutorError::WorkerPanicked
        })?
    }

    /// Request shutdown and wait for the run loop to stop.
    pub fn shutdown(self) -> ExecutorResult<()> {
        match self.executor.stop() {
            Ok(()) | Err(ExecutorError::AlreadyStopped) => {}
            Err(e) => return Err(e),
        }
        self.join()
    }
}
