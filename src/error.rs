//! Error types for simulation startup.
//!
//! Faults inside a running tick are recovered where they happen and logged;
//! only configuration and recorder setup can fail with an `Err`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// An invalid configuration knob.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    NotAProbability { field: &'static str, value: f32 },

    #[error("vehicle axle layout must contain at least one axle")]
    NoAxles,
}

/// Failure of the state-history recorder.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to create output folder {path}: {source}")]
    CreateOutputFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write state history {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level startup error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    // Written as a negated comparison so NaN is rejected too.
    if !(value > 0.0) {
        return Err(ConfigError::NotPositive { field, value });
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(value >= 0.0) {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

pub(crate) fn ensure_probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::NotAProbability { field, value });
    }
    Ok(())
}
