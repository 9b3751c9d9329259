//! Configuration errors.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The key is not present in the source.
    #[error("config key '{key}' is not set")]
    Missing { key: String },

    /// The string does not follow `mode;key=value;...`.
    #[error("invalid config, key: '{key}', value: '{value}' ({reason})")]
    Malformed {
        key: String,
        value: String,
        reason: String,
    },

    /// An option is present but its value does not parse.
    #[error("invalid value for option '{option}': '{value}'")]
    InvalidValue { option: String, value: String },

    /// An option the consumer does not understand.
    #[error("unknown option '{option}'")]
    UnknownOption { option: String },
}

impl ConfigError {
    pub(crate) fn malformed(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
