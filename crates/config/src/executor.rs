//! Serial executor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confstr::{ConfStr, ConfigSource, parse_confstr};
use crate::error::{ConfigError, ConfigResult};

/// Serial executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Name for logging
    pub name: String,
    /// Pending operations accepted before submitters block (0 = rendezvous)
    pub backlog: usize,
    /// How long the run loop waits for work before re-checking cancellation
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "serial".to_string(),
            backlog: 0,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Build from a configuration string: the mode is the queue name,
    /// `backlog` and `poll_ms` are the recognised options.
    pub fn from_confstr(conf: &ConfStr) -> ConfigResult<Self> {
        if let Some(option) = conf
            .options()
            .keys()
            .find(|k| !matches!(k.as_str(), "backlog" | "poll_ms"))
        {
            return Err(ConfigError::UnknownOption {
                option: option.clone(),
            });
        }

        let mut config = Self::default();
        if !conf.mode().is_empty() {
            config.name = conf.mode().to_string();
        }
        if let Some(backlog) = conf.get_parsed::<usize>("backlog")? {
            config.backlog = backlog;
        }
        if let Some(poll_ms) = conf.get_parsed::<u64>("poll_ms")? {
            if poll_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    option: "poll_ms".to_string(),
                    value: "0".to_string(),
                });
            }
            config.poll_interval = Duration::from_millis(poll_ms);
        }
        Ok(config)
    }

    /// Read `key` from `source`; a missing key yields the defaults.
    pub fn from_source(key: &str, source: &ConfigSource) -> ConfigResult<Self> {
        match parse_confstr(key, source) {
            Ok(conf) => Self::from_confstr(&conf),
            Err(ConfigError::Missing { .. }) => {
                debug!(key, "executor config not set, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }
}
