//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config file {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("invalid config file {path}: {message}")]
    ParseFailed { path: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
