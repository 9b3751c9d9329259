//! Configuration loading and representation.
//!
//! Settings arrive as compact `mode;key=value;...` strings, either from the
//! process environment or from an explicit map (tests, embedded configs).

pub mod confstr;
pub mod error;
pub mod executor;

pub use confstr::{ConfStr, ConfigSource, parse_confstr};
pub use error::{ConfigError, ConfigResult};
pub use executor::ExecutorConfig;
