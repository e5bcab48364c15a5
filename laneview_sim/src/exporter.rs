//! JSON exporter for offline inspection of simulation runs.
//!
//! Each exported frame carries the ego state, the ground truth traffic and
//! the per-lane table the occupancy engine published for that cycle.

use crate::error::SimError;
use crate::oracle::{RingRoad, TrafficVehicle};
use crate::world::Cycle;
use laneview_core::LaneIndex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    pub ego: EgoFrame,

    /// Ground truth vehicle positions
    pub vehicles: Vec<VehiclePosition>,

    /// Published per-lane table
    pub lanes: Vec<LaneFrame>,

    /// Ego-lane time-to-collision; omitted when not closing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_collision: Option<f64>,

    /// Events (vetoes, cut-ins, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    /// Builds a frame from the world's latest cycle.
    pub fn capture(time_sec: f64, cycle: &Cycle, vehicles: &[&TrafficVehicle], road: &RingRoad) -> Self {
        let occupancy = &cycle.occupancy;
        let lanes = occupancy
            .table()
            .iter()
            .map(|(lane, state)| {
                let neighbors = occupancy.neighbors().lane(lane);
                LaneFrame {
                    lane,
                    speed: state.speed,
                    free_space: state.free_space,
                    blocked: state.blocked,
                    front_id: neighbors.front.map(|n| n.id),
                    back_id: neighbors.back.map(|n| n.id),
                }
            })
            .collect();

        let ttc = occupancy.time_to_collision();

        Self {
            time_sec,
            ego: EgoFrame {
                s: cycle.ego.s,
                d: cycle.ego.d,
                speed: cycle.ego.speed,
                lane: cycle.ego.lane,
            },
            vehicles: vehicles
                .iter()
                .map(|v| VehiclePosition::new(v, road))
                .collect(),
            lanes,
            time_to_collision: ttc.is_finite().then_some(ttc),
            events: Vec::new(),
        }
    }
}

/// Ego state at the time of the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgoFrame {
    pub s: f64,
    pub d: f64,
    pub speed: f64,
    pub lane: i64,
}

/// Position of a traffic vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub id: u64,
    pub s: f64,
    pub d: f64,
    pub x: f64,
    pub y: f64,
}

impl VehiclePosition {
    pub fn new(vehicle: &TrafficVehicle, road: &RingRoad) -> Self {
        let world = road.to_world(vehicle.s, vehicle.d);
        Self {
            id: vehicle.id,
            s: vehicle.s,
            d: vehicle.d,
            x: world.x,
            y: world.y,
        }
    }
}

/// One lane of the published table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneFrame {
    pub lane: LaneIndex,
    pub speed: f64,
    pub free_space: f64,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_id: Option<i64>,
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Invariant violations found during the run
    pub violations: usize,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            violations: 0,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, violations: usize) {
        self.passed = passed;
        self.violations = violations;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
