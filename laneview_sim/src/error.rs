//! Error types for the LaneView simulator.

use laneview_core::ConfigError;
use thiserror::Error;

/// Errors that can occur while setting up or exporting a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Occupancy configuration failed to load or validate
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export file could not be written
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Scenario name not recognized
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}
