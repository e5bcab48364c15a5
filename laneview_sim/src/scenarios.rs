//! Traffic scenarios for the ring-road simulation.

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// LV-001: Empty corridor, every lane open
    OpenRoad,

    /// LV-002: Many vehicles in all lanes at mixed speeds
    DenseTraffic,

    /// LV-003: Ego drives across the `s` seam with traffic on both sides
    SeamCrossing,

    /// LV-004: Heavy measurement noise plus off-road garbage rows
    SensorNoise,

    /// LV-005: Fast vehicle overtakes in the adjacent lane, then cuts in
    CutIn,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::OpenRoad,
            ScenarioId::DenseTraffic,
            ScenarioId::SeamCrossing,
            ScenarioId::SensorNoise,
            ScenarioId::CutIn,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::OpenRoad => "open_road",
            ScenarioId::DenseTraffic => "dense_traffic",
            ScenarioId::SeamCrossing => "seam_crossing",
            ScenarioId::SensorNoise => "sensor_noise",
            ScenarioId::CutIn => "cut_in",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::OpenRoad => "No traffic; lanes must report max speed and full view",
            ScenarioId::DenseTraffic => "45 vehicles over 3 lanes, mixed speeds",
            ScenarioId::SeamCrossing => "Ego crosses s=max_s with neighbors across the seam",
            ScenarioId::SensorNoise => "2m position noise and 20% garbage lateral readings",
            ScenarioId::CutIn => "Fast overtaker blocks the adjacent lane, then cuts in ahead",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open_road" | "openroad" | "lv-001" => Ok(ScenarioId::OpenRoad),
            "dense_traffic" | "densetraffic" | "lv-002" => Ok(ScenarioId::DenseTraffic),
            "seam_crossing" | "seamcrossing" | "lv-003" => Ok(ScenarioId::SeamCrossing),
            "sensor_noise" | "sensornoise" | "lv-004" => Ok(ScenarioId::SensorNoise),
            "cut_in" | "cutin" | "lv-005" => Ok(ScenarioId::CutIn),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>().unwrap(), scenario);
        }
        assert_eq!("LV-005".parse::<ScenarioId>().unwrap(), ScenarioId::CutIn);
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
