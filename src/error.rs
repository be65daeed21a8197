//! Crate error types.
//!
//! Expected in-flight failures (loss of arming, mode change, attitude error,
//! pilot override) are not errors: the tuner handles them on the revert path
//! with a status message. `TuneError` covers configuration problems and the
//! one fallible external seam, persisting gains.

use thiserror::Error;

use crate::params::Param;

/// Errors surfaced by the tuner's fallible entry points.
#[derive(Debug, Error)]
pub enum TuneError {
    /// A configuration value is outside its accepted range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A gain could not be written to the persistent parameter store.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Failure writing one gain to the persistent parameter store.
#[derive(Debug, Error)]
#[error("failed to persist {param}: {reason}")]
pub struct PersistError {
    /// Display name of the gain that failed to persist.
    pub param: &'static str,
    pub reason: String,
}

impl PersistError {
    pub fn new(param: Param, reason: impl Into<String>) -> Self {
        PersistError { param: param.name(), reason: reason.into() }
    }
}
