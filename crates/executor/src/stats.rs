//! Executor runtime statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters maintained by the run loop.
///
/// Join outcomes are not tracked here: skipped (stale) joins are normal
/// executions of their wrapper as far as the loop is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Operations that returned normally.
    pub executed: u64,
    /// Operations that panicked (caught and logged).
    pub faulted: u64,
    /// Operations admitted to the queue but dropped by `stop`.
    pub discarded: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

impl ExecutorStats {
    /// Operations the run loop dequeued and invoked.
    pub fn processed(&self) -> u64 {
        self.executed + self.faulted
    }

    pub(crate) fn snapshot(&self) -> Self {
        let mut s = self.clone();
        if let Some(started) = s.started_at {
            let end = s.ended_at.unwrap_or_else(Utc::now);
            s.uptime_secs = (end - started).num_seconds().max(0) as u64;
        }
        s
    }
}
