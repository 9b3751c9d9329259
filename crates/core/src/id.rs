//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExecutorError;

/// Identifier of one executor instance.
///
/// Executors are single use, so a restarted queue with the same name gets a
/// fresh id; log lines from both can be told apart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorId(Uuid);

impl ExecutorId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutorId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for ExecutorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for ExecutorId {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| ExecutorError::invalid_id(format!("ExecutorId: {}", e)))?;
        Ok(Self(uuid))
    }
}
