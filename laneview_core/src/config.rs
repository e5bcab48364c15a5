//! Deployment configuration for the occupancy engines.
//!
//! These constants are fixed for a given vehicle/corridor and never change
//! between planning cycles. Defaults describe a three-lane highway loop with
//! 4m lanes and a 50 mph limit.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MPH_TO_MPS: f64 = 0.44704;

/// Converts miles per hour to meters per second.
#[inline]
pub fn mph_to_mps(mph: f64) -> f64 {
    mph * MPH_TO_MPS
}

/// Converts meters per second to miles per hour.
#[inline]
pub fn mps_to_mph(mps: f64) -> f64 {
    mps / MPH_TO_MPS
}

/// Unit in which the caller reports the ego speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    /// Miles per hour (what the localization feed reports)
    #[default]
    Mph,
    /// Meters per second
    Mps,
}

impl SpeedUnit {
    /// Converts a speed in this unit to meters per second.
    pub fn to_mps(self, speed: f64) -> f64 {
        match self {
            SpeedUnit::Mph => mph_to_mps(speed),
            SpeedUnit::Mps => speed,
        }
    }

    /// Converts a speed in meters per second to this unit.
    pub fn from_mps(self, mps: f64) -> f64 {
        match self {
            SpeedUnit::Mph => mps_to_mph(mps),
            SpeedUnit::Mps => mps,
        }
    }
}

/// Configuration for lane occupancy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyConfig {
    /// Lateral width of a single lane in meters (default: 4.0)
    pub lane_width: f64,

    /// Corridor length in meters; `s` wraps with this period (default: 6945.554)
    pub max_s: f64,

    /// Longitudinal sensing radius around the ego vehicle (default: 70.0 m)
    pub field_of_view: f64,

    /// Speed limit used for empty lanes and absent leaders (default: 49.5 mph)
    pub max_speed_mph: f64,

    /// Maximum deceleration the vehicle can achieve (default: 10.0 m/s²)
    pub max_deceleration: f64,

    /// Fraction of `max_deceleration` used for all safety math (default: 0.8)
    pub deceleration_factor: f64,

    /// Car-length safety constant `L`; margins add `2L` (default: 2.5 m)
    pub car_safety_length: f64,

    /// Baseline lane-change gap when no overtaking relation exists (default: 10.0 m)
    pub lane_change_min_gap: f64,

    /// Reaction/maneuver allowance for trailing traffic (default: 2.0 s)
    pub back_latency: f64,

    /// Unit of `EgoState::speed` (default: mph)
    pub ego_speed_unit: SpeedUnit,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            lane_width: 4.0,
            max_s: 6945.554,
            field_of_view: 70.0,
            max_speed_mph: 49.5,
            max_deceleration: 10.0,
            deceleration_factor: 0.8,
            car_safety_length: 2.5,
            lane_change_min_gap: 10.0,
            back_latency: 2.0,
            ego_speed_unit: SpeedUnit::Mph,
        }
    }
}

impl OccupancyConfig {
    /// Parses and validates a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that every constant is usable by the engines.
    ///
    /// The field of view must fit twice into the corridor so that the wrap
    /// shift can always place the sensing window inside `[0, max_s]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("lane_width", self.lane_width),
            ("max_s", self.max_s),
            ("field_of_view", self.field_of_view),
            ("max_speed_mph", self.max_speed_mph),
            ("max_deceleration", self.max_deceleration),
            ("car_safety_length", self.car_safety_length),
            ("lane_change_min_gap", self.lane_change_min_gap),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be positive and finite, got {}", value),
                ));
            }
        }

        if !(self.deceleration_factor > 0.0 && self.deceleration_factor <= 1.0) {
            return Err(ConfigError::invalid(
                "deceleration_factor",
                format!("must lie in (0, 1], got {}", self.deceleration_factor),
            ));
        }

        if !self.back_latency.is_finite() || self.back_latency < 0.0 {
            return Err(ConfigError::invalid(
                "back_latency",
                format!("must be non-negative and finite, got {}", self.back_latency),
            ));
        }

        if 2.0 * self.field_of_view >= self.max_s {
            return Err(ConfigError::invalid(
                "field_of_view",
                format!(
                    "window of {}m does not fit in corridor of {}m",
                    2.0 * self.field_of_view,
                    self.max_s
                ),
            ));
        }

        Ok(())
    }

    /// Configured maximum speed in m/s.
    #[inline]
    pub fn max_speed(&self) -> f64 {
        mph_to_mps(self.max_speed_mph)
    }

    /// Conservative deceleration in m/s² used for every safety distance.
    #[inline]
    pub fn deceleration(&self) -> f64 {
        self.deceleration_factor * self.max_deceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = OccupancyConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.deceleration(), 8.0);
        assert_relative_eq!(config.max_speed(), 22.12848, epsilon = 1e-5);
    }

    #[test]
    fn test_unit_conversion() {
        assert_relative_eq!(mph_to_mps(50.0), 22.352, epsilon = 1e-9);
        assert_relative_eq!(mps_to_mph(mph_to_mps(37.5)), 37.5, epsilon = 1e-9);
        assert_relative_eq!(SpeedUnit::Mps.to_mps(12.0), 12.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = OccupancyConfig::from_json_str(
            r#"{ "field_of_view": 50.0, "ego_speed_unit": "mps" }"#,
        )
        .unwrap();

        assert_eq!(config.field_of_view, 50.0);
        assert_eq!(config.ego_speed_unit, SpeedUnit::Mps);
        assert_eq!(config.lane_width, 4.0);
    }

    #[test]
    fn test_field_of_view_must_fit_corridor() {
        let config = OccupancyConfig {
            max_s: 100.0,
            field_of_view: 50.0,
            ..Default::default()
        };

        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "field_of_view"),
            other => panic!("expected field_of_view error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = OccupancyConfig {
            deceleration_factor: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OccupancyConfig {
            max_deceleration: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(matches!(
            OccupancyConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
