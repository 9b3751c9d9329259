//! `mode;key=value;...` configuration strings.
//!
//! The first segment is a bare mode word; every following non-empty segment is
//! a `key=value` pair split on the first `=`. A trailing `;` is accepted:
//!
//! ```text
//! db;backlog=16;poll_ms=25;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Where configuration strings are looked up.
#[derive(Debug, Clone, Default)]
pub enum ConfigSource {
    /// Process environment variables.
    #[default]
    Env,
    /// An explicit key → value map.
    Map(HashMap<String, String>),
}

impl ConfigSource {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        match self {
            ConfigSource::Env => std::env::var(key).ok(),
            ConfigSource::Map(map) => map.get(key).cloned(),
        }
    }
}

/// A parsed configuration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfStr {
    mode: String,
    options: BTreeMap<String, String>,
}

impl ConfStr {
    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn get(&self, option: &str) -> Option<&str> {
        self.options.get(option).map(String::as_str)
    }

    /// Parse an option with `FromStr`; `Ok(None)` when absent.
    pub fn get_parsed<T: FromStr>(&self, option: &str) -> ConfigResult<Option<T>> {
        match self.get(option) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    option: option.to_string(),
                    value: raw.to_string(),
                }),
        }
    }

    /// Parse a raw value; `key` only labels error messages.
    pub fn parse(key: &str, value: &str) -> ConfigResult<Self> {
        let mut segments = value.split(';');

        let mode = segments.next().unwrap_or_default();
        if mode.contains('=') {
            return Err(ConfigError::malformed(
                key,
                value,
                "first parameter must not contain separator '='",
            ));
        }

        let mut options = BTreeMap::new();
        for segment in segments.filter(|s| !s.is_empty()) {
            let Some((k, v)) = segment.split_once('=') else {
                return Err(ConfigError::malformed(key, value, "parse key=value failed"));
            };
            if v.is_empty() {
                return Err(ConfigError::malformed(
                    key,
                    value,
                    format!("key {k} has empty val"),
                ));
            }
            options.insert(k.to_string(), v.to_string());
        }

        Ok(Self {
            mode: mode.to_string(),
            options,
        })
    }
}

/// Look up `key` in `source` and parse it as a configuration string.
pub fn parse_confstr(key: &str, source: &ConfigSource) -> ConfigResult<ConfStr> {
    let value = source.lookup(key).ok_or_else(|| ConfigError::Missing {
        key: key.to_string(),
    })?;
    ConfStr::parse(key, &value)
}
