//! Executor lifecycle state.

use serde::{Deserialize, Serialize};

/// `Uninitialized → Ready → Stopped`; `Stopped` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    /// Queue allocated, no execution context yet.
    Uninitialized,
    /// Context derived; the run loop may be started and submissions are served.
    Ready,
    /// Context cancelled and queue closed.
    Stopped,
}

impl ExecutorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorState::Uninitialized => "uninitialized",
            ExecutorState::Ready => "ready",
            ExecutorState::Stopped => "stopped",
        }
    }
}

impl core::fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
