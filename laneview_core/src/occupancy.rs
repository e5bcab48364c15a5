//! Lane Occupancy - Orchestrates the engines for one planning cycle.
//!
//! ```text
//!  Snapshot + EgoState
//!          │
//!  ┌───────▼────────┐   ┌──────────────┐   ┌───────────────┐
//!  │    GEOMETRY    │──►│    SAFETY    │──►│   SYNTHESIS   │──► LaneStateTable
//!  │ nearest front/ │   │  TTC, SD,    │   │ speed / free  │
//!  │ back per lane  │   │  LC margins  │   │ space + veto  │
//!  └────────────────┘   └──────────────┘   └───────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use laneview_core::{EgoState, LaneOccupancy, OccupancyConfig, Snapshot};
//!
//! let config = OccupancyConfig::default();
//! let snapshot = Snapshot::from_rows(&[[0.0, 0.0, 0.0, 10.0, 0.0, 140.0, 2.0]]);
//! let ego = EgoState::new(100.0, 6.0, 30.0, 1);
//!
//! let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);
//! assert_eq!(occupancy.lane_free_space(0), 40.0);
//! assert_eq!(occupancy.lane_speed(7), 0.0);
//! ```

use crate::config::OccupancyConfig;
use crate::lane::LaneIndex;
use crate::laneview_geometry::{locate_neighbors, NearestNeighborTable};
use crate::laneview_safety::{compute_margins, SafetyMarginSet};
use crate::laneview_synthesis::{synthesize, LaneState, LaneStateTable};
use crate::observation::{EgoState, Snapshot};
use serde::{Deserialize, Serialize};

/// The complete per-lane evaluation of a single planning cycle.
///
/// Built once from a snapshot and ego state and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneOccupancy {
    /// Lane whose leader drives the following kinematics
    following_lane: Option<LaneIndex>,

    /// Lane exempt from the danger veto
    occupied_lane: Option<LaneIndex>,

    neighbors: NearestNeighborTable,
    margins: SafetyMarginSet,
    table: LaneStateTable,
}

impl LaneOccupancy {
    /// Runs geometry, safety and synthesis for one cycle.
    ///
    /// Following kinematics use the behavior-layer lane (`ego.lane`), since
    /// during a lane change that is the leader the ego must slot behind. The
    /// veto exemption uses the lane the ego physically occupies (`ego.d`).
    /// Each falls back to the other when invalid.
    ///
    /// # Panics
    /// If `2 * field_of_view >= max_s`; validate configs with
    /// [`OccupancyConfig::validate`] before use.
    pub fn evaluate(snapshot: &Snapshot, ego: &EgoState, config: &OccupancyConfig) -> Self {
        assert!(
            2.0 * config.field_of_view < config.max_s,
            "field of view {} does not fit in corridor {}",
            config.field_of_view,
            config.max_s
        );

        let planned = ego.planned_lane();
        let physical = ego.physical_lane(config.lane_width);
        let following_lane = planned.or(physical);
        let occupied_lane = physical.or(planned);

        let neighbors = locate_neighbors(snapshot, ego, config);
        let margins = compute_margins(ego, following_lane, &neighbors, config);
        let table = synthesize(occupied_lane, &neighbors, &margins, config);

        Self {
            following_lane,
            occupied_lane,
            neighbors,
            margins,
            table,
        }
    }

    /// Achievable speed (m/s) in `lane`, or `0` for an invalid index.
    pub fn lane_speed(&self, lane: i64) -> f64 {
        self.table.get(lane).map_or(0.0, |s| s.speed)
    }

    /// Free space (m) ahead in `lane`, or `0` for an invalid index.
    pub fn lane_free_space(&self, lane: i64) -> f64 {
        self.table.get(lane).map_or(0.0, |s| s.free_space)
    }

    /// Whether the danger veto fired for `lane`. Invalid indices are not blocked.
    pub fn is_lane_blocked(&self, lane: i64) -> bool {
        self.table.get(lane).is_some_and(|s| s.blocked)
    }

    pub fn lane_state(&self, lane: i64) -> Option<&LaneState> {
        self.table.get(lane)
    }

    /// Minimum admissible gap to the front neighbor of `lane`, `0` if invalid.
    pub fn front_safety_distance(&self, lane: i64) -> f64 {
        LaneIndex::new(lane).map_or(0.0, |l| self.margins.lane(l).front)
    }

    /// Minimum admissible gap to the back neighbor of `lane`, `0` if invalid.
    pub fn back_safety_distance(&self, lane: i64) -> f64 {
        LaneIndex::new(lane).map_or(0.0, |l| self.margins.lane(l).back)
    }

    pub fn time_to_collision(&self) -> f64 {
        self.margins.ego.time_to_collision
    }

    pub fn time_to_decelerate(&self) -> f64 {
        self.margins.ego.time_to_decelerate
    }

    pub fn safety_distance(&self) -> f64 {
        self.margins.ego.safety_distance
    }

    pub fn paranoid_safety_distance(&self) -> f64 {
        self.margins.ego.paranoid_safety_distance
    }

    pub fn following_lane(&self) -> Option<LaneIndex> {
        self.following_lane
    }

    pub fn occupied_lane(&self) -> Option<LaneIndex> {
        self.occupied_lane
    }

    pub fn neighbors(&self) -> &NearestNeighborTable {
        &self.neighbors
    }

    pub fn margins(&self) -> &SafetyMarginSet {
        &self.margins
    }

    pub fn table(&self) -> &LaneStateTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedUnit;
    use approx::assert_relative_eq;

    fn row(id: f64, s: f64, d: f64, vx: f64, vy: f64) -> [f64; 7] {
        [id, 0.0, 0.0, vx, vy, s, d]
    }

    #[test]
    fn test_adjacent_leader_scenario() {
        // Ego lane 1 at s=100, 20 mph; lane 0 leader 10m ahead at 15 m/s
        let config = OccupancyConfig {
            lane_change_min_gap: 5.0,
            ..Default::default()
        };
        let snapshot = Snapshot::from_rows(&[row(0.0, 110.0, 2.0, 9.0, 12.0)]);
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);

        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        assert_relative_eq!(occupancy.lane_speed(0), 15.0, epsilon = 1e-9);
        assert_relative_eq!(occupancy.lane_free_space(0), 10.0, epsilon = 1e-9);
        assert_eq!(occupancy.lane_speed(2), config.max_speed());
        assert_eq!(occupancy.lane_free_space(2), config.field_of_view);
    }

    #[test]
    fn test_adjacent_leader_at_baseline_is_blocked() {
        // Same scene with the default 10m baseline: 10m <= 10m vetoes lane 0
        let config = OccupancyConfig::default();
        let snapshot = Snapshot::from_rows(&[row(0.0, 110.0, 2.0, 9.0, 12.0)]);
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);

        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        assert!(occupancy.is_lane_blocked(0));
        assert_eq!(occupancy.lane_speed(0), 0.0);
        assert_eq!(occupancy.lane_free_space(0), 0.0);
    }

    #[test]
    fn test_time_to_collision_scenario() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let snapshot = Snapshot::from_rows(&[row(3.0, 130.0, 6.0, 10.0, 0.0)]);
        let ego = EgoState::new(100.0, 6.0, 25.0, 1);

        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        assert_relative_eq!(occupancy.time_to_collision(), 2.0, epsilon = 1e-9);
        let ttd = 15.0 / config.deceleration();
        assert_relative_eq!(occupancy.time_to_decelerate(), ttd);
        assert_relative_eq!(
            occupancy.safety_distance(),
            25.0 * ttd + 2.0 * config.car_safety_length
        );
        assert!(occupancy.safety_distance() > 2.0 * config.car_safety_length);
    }

    #[test]
    fn test_out_of_range_queries() {
        let occupancy = LaneOccupancy::evaluate(
            &Snapshot::default(),
            &EgoState::new(100.0, 6.0, 20.0, 1),
            &OccupancyConfig::default(),
        );

        assert_eq!(occupancy.lane_speed(-1), 0.0);
        assert_eq!(occupancy.lane_speed(5), 0.0);
        assert_eq!(occupancy.lane_free_space(3), 0.0);
        assert_eq!(occupancy.front_safety_distance(-1), 0.0);
        assert_eq!(occupancy.back_safety_distance(3), 0.0);
        assert_eq!(occupancy.back_safety_distance(0), 10.0);
        assert!(!occupancy.is_lane_blocked(9));
        assert!(occupancy.lane_state(3).is_none());
    }

    #[test]
    fn test_planned_lane_drives_kinematics() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        // Physically in lane 1, changing into lane 2 where a slow car sits
        let snapshot = Snapshot::from_rows(&[row(0.0, 150.0, 10.0, 5.0, 0.0)]);
        let ego = EgoState::new(100.0, 6.0, 15.0, 2);

        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        assert_eq!(occupancy.following_lane(), LaneIndex::new(2));
        assert_eq!(occupancy.occupied_lane(), LaneIndex::new(1));
        assert_relative_eq!(occupancy.time_to_collision(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_repeated_evaluation_is_identical() {
        let config = OccupancyConfig::default();
        let snapshot = Snapshot::from_rows(&[
            row(0.0, 120.0, 2.0, 12.0, 1.0),
            row(1.0, 80.0, 10.0, 25.0, 0.0),
            row(2.0, 160.0, 6.0, 18.0, 0.0),
        ]);
        let ego = EgoState::new(100.0, 6.0, 45.0, 1);

        let a = LaneOccupancy::evaluate(&snapshot, &ego, &config);
        let b = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        assert_eq!(a, b);
    }
}
