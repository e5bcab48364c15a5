//! Error types for LaneView configuration and snapshot decoding.
//!
//! The per-cycle evaluation itself never fails; these errors only surface at
//! the boundaries where configuration files and raw sensor rows are loaded.

use thiserror::Error;

/// Errors raised while loading or validating an [`OccupancyConfig`](crate::OccupancyConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON was malformed
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the engines cannot work with
    #[error("Invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Creates an invalid-field error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised by strict snapshot decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A sensor fusion row has fewer than the seven required fields
    #[error("Sensor fusion row {index} has {len} fields, expected 7")]
    RowTooShort { index: usize, len: usize },

    /// Snapshot JSON was malformed
    #[error("Snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
