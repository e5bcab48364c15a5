//! Per-cycle invariant checking for occupancy evaluations.
//!
//! Every simulated cycle is re-checked against the properties the planner
//! relies on:
//! - Determinism (a second evaluation of the same inputs is identical)
//! - Non-negative speed and free space in every lane
//! - Danger veto: a non-ego lane with a back neighbor at or inside its margin is (0, 0)
//! - Open-lane default: no leader and a clear back yields (max speed, FOV)
//! - Every reported neighbor lies inside the field of view

use laneview_core::{EgoState, LaneIndex, LaneOccupancy, LaneState, OccupancyConfig, Snapshot};
use serde::{Deserialize, Serialize};

/// Category of a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    NonDeterministic,
    NegativeOutput,
    VetoMismatch,
    DefaultMismatch,
    NeighborOutsideView,
}

/// A single failed check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub tick: u64,
    pub lane: Option<LaneIndex>,
    pub kind: ViolationKind,
    pub detail: String,
}

/// Accumulates invariant results over a run.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<Violation>,
    cycles: u64,
    vetoes: u64,
    cross_seam_detections: u64,
}

impl InvariantChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks one cycle's evaluation against its inputs.
    pub fn check(
        &mut self,
        tick: u64,
        snapshot: &Snapshot,
        ego: &EgoState,
        occupancy: &LaneOccupancy,
        config: &OccupancyConfig,
    ) {
        self.cycles += 1;

        let replay = LaneOccupancy::evaluate(snapshot, ego, config);
        if &replay != occupancy {
            self.record(tick, None, ViolationKind::NonDeterministic, "replayed evaluation differs");
        }

        for (lane, state) in occupancy.table().iter() {
            let neighbors = occupancy.neighbors().lane(lane);
            let margins = occupancy.margins().lane(lane);
            let own = occupancy.occupied_lane() == Some(lane);

            if state.blocked {
                self.vetoes += 1;
            }

            if !(state.speed >= 0.0 && state.free_space >= 0.0) {
                self.record(
                    tick,
                    Some(lane),
                    ViolationKind::NegativeOutput,
                    format!("speed={} free_space={}", state.speed, state.free_space),
                );
            }

            let back_d = neighbors.back_distance();
            if vetoed_lane_left_open(own, back_d, margins.back, state) {
                self.record(
                    tick,
                    Some(lane),
                    ViolationKind::VetoMismatch,
                    format!("back at {:.2}m inside margin {:.2}m but lane open", back_d, margins.back),
                );
            }

            if neighbors.front.is_none()
                && (own || back_d > margins.back)
                && (state.speed != config.max_speed() || state.free_space != config.field_of_view)
            {
                self.record(
                    tick,
                    Some(lane),
                    ViolationKind::DefaultMismatch,
                    format!("open lane reported ({}, {})", state.speed, state.free_space),
                );
            }

            for neighbor in [neighbors.front, neighbors.back].into_iter().flatten() {
                if neighbor.distance > config.field_of_view + 1e-9 {
                    self.record(
                        tick,
                        Some(lane),
                        ViolationKind::NeighborOutsideView,
                        format!("object {} at {:.2}m", neighbor.id, neighbor.distance),
                    );
                }

                let raw_s = snapshot.get(neighbor.index).map_or(ego.s, |o| o.s);
                if (raw_s - ego.s).abs() > config.max_s / 2.0 {
                    self.cross_seam_detections += 1;
                }
            }
        }
    }

    fn record(&mut self, tick: u64, lane: Option<LaneIndex>, kind: ViolationKind, detail: impl Into<String>) {
        self.violations.push(Violation {
            tick,
            lane,
            kind,
            detail: detail.into(),
        });
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Lane-cycles in which the danger veto fired.
    pub fn vetoes(&self) -> u64 {
        self.vetoes
    }

    /// Neighbors found on the far side of the `s` seam from the ego.
    pub fn cross_seam_detections(&self) -> u64 {
        self.cross_seam_detections
    }
}

/// A non-ego lane whose back neighbor sits at or inside its margin must
/// publish `(0, 0)`.
fn vetoed_lane_left_open(own: bool, back_d: f64, back_margin: f64, state: &LaneState) -> bool {
    !own && back_d <= back_margin && (state.speed != 0.0 || state.free_space != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_cycle() {
        let config = OccupancyConfig::default();
        let snapshot = Snapshot::from_rows(&[
            [0.0, 0.0, 0.0, 10.0, 0.0, 150.0, 2.0],
            [1.0, 0.0, 0.0, 30.0, 0.0, 60.0, 10.0],
        ]);
        let ego = EgoState::new(100.0, 6.0, 40.0, 1);
        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        let mut checker = InvariantChecker::new();
        checker.check(0, &snapshot, &ego, &occupancy, &config);

        assert!(checker.is_clean(), "{:?}", checker.violations());
        assert_eq!(checker.cycles(), 1);
        assert_eq!(checker.vetoes(), 1);
    }

    #[test]
    fn test_mismatched_evaluation_is_flagged() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 40.0, 1);
        let empty = Snapshot::default();
        let busy = Snapshot::from_rows(&[[0.0, 0.0, 0.0, 10.0, 0.0, 120.0, 6.0]]);

        // Result from one snapshot checked against another
        let occupancy = LaneOccupancy::evaluate(&busy, &ego, &config);
        let mut checker = InvariantChecker::new();
        checker.check(3, &empty, &ego, &occupancy, &config);

        assert!(!checker.is_clean());
        assert_eq!(checker.violations()[0].kind, ViolationKind::NonDeterministic);
        assert_eq!(checker.violations()[0].tick, 3);
    }

    #[test]
    fn test_veto_boundary_is_cross_checked() {
        let open = LaneState {
            speed: 5.0,
            free_space: 70.0,
            blocked: false,
        };
        let blocked = LaneState {
            speed: 0.0,
            free_space: 0.0,
            blocked: true,
        };

        // Back neighbor exactly at its margin must be vetoed
        assert!(vetoed_lane_left_open(false, 10.0, 10.0, &open));
        assert!(!vetoed_lane_left_open(false, 10.0, 10.0, &blocked));
        assert!(!vetoed_lane_left_open(false, 10.5, 10.0, &open));
        assert!(!vetoed_lane_left_open(true, 10.0, 10.0, &open));
    }

    #[test]
    fn test_evaluation_at_margin_is_clean() {
        let config = OccupancyConfig {
            ego_speed_unit: laneview_core::SpeedUnit::Mps,
            ..Default::default()
        };
        let ego = EgoState::new(100.0, 6.0, 20.0, 1);
        let snapshot = Snapshot::from_rows(&[[0.0, 0.0, 0.0, 5.0, 0.0, 90.0, 10.0]]);
        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        let mut checker = InvariantChecker::new();
        checker.check(0, &snapshot, &ego, &occupancy, &config);

        assert!(checker.is_clean(), "{:?}", checker.violations());
        assert_eq!(checker.vetoes(), 1);
    }

    #[test]
    fn test_cross_seam_detection_counted() {
        let config = OccupancyConfig::default();
        let snapshot = Snapshot::from_rows(&[[0.0, 0.0, 0.0, 10.0, 0.0, config.max_s - 5.0, 6.0]]);
        let ego = EgoState::new(5.0, 6.0, 40.0, 1);
        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &config);

        let mut checker = InvariantChecker::new();
        checker.check(0, &snapshot, &ego, &occupancy, &config);

        assert!(checker.is_clean());
        assert_eq!(checker.cross_seam_detections(), 1);
    }
}
