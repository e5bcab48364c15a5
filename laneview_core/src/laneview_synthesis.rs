//! The "SYNTHESIS" Engine - Per-Lane Speed and Free Space
//!
//! Combines the neighbor table and safety margins into the published
//! per-lane table. A neighboring lane whose nearest objects sit inside their
//! lane-change margins is vetoed outright: speed and free space both become
//! zero. The ego's own lane is never vetoed.

use crate::config::OccupancyConfig;
use crate::lane::{LaneIndex, PerLane};
use crate::laneview_geometry::NearestNeighborTable;
use crate::laneview_safety::SafetyMarginSet;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Achievable speed and free space for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneState {
    /// Achievable speed in the lane (m/s)
    pub speed: f64,

    /// Longitudinal free space ahead (m)
    pub free_space: f64,

    /// True when the danger veto fired
    pub blocked: bool,
}

impl LaneState {
    const BLOCKED: LaneState = LaneState {
        speed: 0.0,
        free_space: 0.0,
        blocked: true,
    };

    fn open(speed: f64, free_space: f64) -> Self {
        Self {
            speed: speed.max(0.0),
            free_space: free_space.max(0.0),
            blocked: false,
        }
    }
}

/// The published per-lane result of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneStateTable {
    lanes: PerLane<LaneState>,
}

impl LaneStateTable {
    pub fn lane(&self, lane: LaneIndex) -> &LaneState {
        &self.lanes[lane]
    }

    /// Looks up a raw lane number; `None` when out of range.
    pub fn get(&self, lane: i64) -> Option<&LaneState> {
        self.lanes.get(lane)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LaneIndex, &LaneState)> {
        self.lanes.iter()
    }
}

/// Builds the per-lane table from this cycle's neighbors and margins.
pub fn synthesize(
    ego_lane: Option<LaneIndex>,
    neighbors: &NearestNeighborTable,
    margins: &SafetyMarginSet,
    config: &OccupancyConfig,
) -> LaneStateTable {
    let lanes = PerLane::from_fn(|lane| {
        let n = neighbors.lane(lane);
        let m = margins.lane(lane);
        let adjacent = ego_lane != Some(lane);
        let back_unsafe = n.back_distance() <= m.back;

        let state = match n.front {
            Some(front) => {
                if adjacent && (back_unsafe || front.distance <= m.front) {
                    LaneState::BLOCKED
                } else {
                    LaneState::open(front.speed, front.distance)
                }
            }
            None => {
                if adjacent && back_unsafe {
                    LaneState::BLOCKED
                } else {
                    LaneState::open(config.max_speed(), config.field_of_view)
                }
            }
        };

        trace!(
            %lane,
            front = ?n.front.map(|f| f.id),
            front_d = n.front_distance(),
            back = ?n.back.map(|b| b.id),
            back_d = n.back_distance(),
            speed = state.speed,
            free_space = state.free_space,
            blocked = state.blocked,
            "lane state"
        );

        state
    });

    LaneStateTable { lanes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeedUnit;
    use crate::laneview_geometry::locate_neighbors;
    use crate::laneview_safety::compute_margins;
    use crate::observation::{EgoState, ObjectObservation, Snapshot};
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn obs(id: i64, s: f64, d: f64, speed: f64) -> ObjectObservation {
        ObjectObservation {
            id,
            position: Vector2::zeros(),
            velocity: Vector2::new(0.0, speed),
            s,
            d,
        }
    }

    fn lane(i: i64) -> LaneIndex {
        LaneIndex::new(i).unwrap()
    }

    fn run(snapshot: &Snapshot, ego: &EgoState, config: &OccupancyConfig) -> LaneStateTable {
        let ego_lane = ego.physical_lane(config.lane_width);
        let neighbors = locate_neighbors(snapshot, ego, config);
        let margins = compute_margins(ego, ego_lane, &neighbors, config);
        synthesize(ego_lane, &neighbors, &margins, config)
    }

    #[test]
    fn test_empty_road() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 30.0, 1);

        let table = run(&Snapshot::default(), &ego, &config);

        for (_, state) in table.iter() {
            assert_eq!(state.speed, config.max_speed());
            assert_eq!(state.free_space, config.field_of_view);
            assert!(!state.blocked);
        }
    }

    #[test]
    fn test_leader_in_adjacent_lane() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 10.0, 1);
        let snapshot = Snapshot::new(vec![obs(0, 140.0, 2.0, 15.0)]);

        let table = run(&snapshot, &ego, &config);
        let l0 = table.lane(lane(0));

        assert_relative_eq!(l0.speed, 15.0);
        assert_relative_eq!(l0.free_space, 40.0);
        assert!(!l0.blocked);
    }

    #[test]
    fn test_front_inside_margin_blocks_adjacent_lane() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);
        // Front margin: 20 over 12 -> 25m. Car at 20m is inside it.
        let snapshot = Snapshot::new(vec![obs(0, 120.0, 2.0, 12.0)]);

        let table = run(&snapshot, &ego, &config);

        assert_eq!(*table.lane(lane(0)), LaneState::BLOCKED);
    }

    #[test]
    fn test_back_inside_margin_blocks_empty_lane() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);
        // Back margin: 28 over 20 with 2s latency -> 89m
        let snapshot = Snapshot::new(vec![obs(0, 40.0, 10.0, 28.0)]);

        let table = run(&snapshot, &ego, &config);

        assert_eq!(*table.lane(lane(2)), LaneState::BLOCKED);
        assert!(!table.lane(lane(0)).blocked);
    }

    #[test]
    fn test_back_exactly_at_margin_blocks_lane() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);
        // Slower follower: back margin is the 10m baseline, gap is exactly 10m
        let snapshot = Snapshot::new(vec![obs(0, 90.0, 10.0, 5.0)]);
        let neighbors = locate_neighbors(&snapshot, &ego, &config);
        let margins = compute_margins(&ego, LaneIndex::new(1), &neighbors, &config);

        assert_eq!(neighbors.lane(lane(2)).back_distance(), 10.0);
        assert_eq!(margins.lane(lane(2)).back, config.lane_change_min_gap);

        let table = synthesize(LaneIndex::new(1), &neighbors, &margins, &config);
        assert_eq!(*table.lane(lane(2)), LaneState::BLOCKED);

        // Just outside the margin the lane stays open
        let snapshot = Snapshot::new(vec![obs(0, 89.5, 10.0, 5.0)]);
        let table = run(&snapshot, &ego, &config);
        assert!(!table.lane(lane(2)).blocked);
    }

    #[test]
    fn test_own_lane_never_vetoed() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);
        let snapshot = Snapshot::new(vec![
            obs(0, 103.0, 6.0, 5.0), // tailgated leader
            obs(1, 98.0, 6.0, 30.0), // fast follower
        ]);

        let table = run(&snapshot, &ego, &config);
        let own = table.lane(lane(1));

        assert!(!own.blocked);
        assert_relative_eq!(own.speed, 5.0);
        assert_relative_eq!(own.free_space, 3.0);
    }

    #[test]
    fn test_no_ego_lane_checks_every_lane() {
        let config = OccupancyConfig {
            ego_speed_unit: SpeedUnit::Mps,
            ..Default::default()
        };
        // Ego off the road; every lane counts as adjacent
        let ego = EgoState::new(100.0, -2.0, 20.0, -1);
        let snapshot = Snapshot::new(vec![obs(0, 95.0, 6.0, 20.0)]);

        let table = run(&snapshot, &ego, &config);

        // 5m behind is inside the 10m baseline
        assert!(table.lane(lane(1)).blocked);
        assert!(!table.lane(lane(0)).blocked);
    }

    #[test]
    fn test_out_of_range_lookup() {
        let table = LaneStateTable::default();
        assert!(table.get(-1).is_none());
        assert!(table.get(3).is_none());
        assert!(table.get(2).is_some());
    }
}
