//! The "SAFETY" Engine - Kinematic Safety Margins
//!
//! Derives, from relative velocities and a conservative deceleration model:
//! - Ego-lane following quantities (time-to-collision, time-to-decelerate,
//!   nominal safety distance, paranoid stopping distance)
//! - Per-lane lane-change margins in front of and behind the ego
//!
//! All math uses `deceleration_factor * max_deceleration`, never the
//! vehicle's full braking capability.

use crate::config::OccupancyConfig;
use crate::lane::{LaneIndex, PerLane};
use crate::laneview_geometry::NearestNeighborTable;
use crate::observation::EgoState;
use serde::{Deserialize, Serialize};
use tracing::trace;

// ============================================================================
// MARGIN MODEL
// ============================================================================

/// Shared lane-change margin formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginModel {
    /// Conservative deceleration (m/s²)
    pub deceleration: f64,

    /// Car-length safety constant `L` (m)
    pub car_safety_length: f64,

    /// Baseline gap when the trailing party is not faster (m)
    pub min_gap: f64,
}

impl MarginModel {
    pub fn from_config(config: &OccupancyConfig) -> Self {
        Self {
            deceleration: config.deceleration(),
            car_safety_length: config.car_safety_length,
            min_gap: config.lane_change_min_gap,
        }
    }

    /// Minimum gap between a trailing body at `v_back` and a leading body at
    /// `v_front`, allowing `latency` seconds before braking starts.
    ///
    /// A trailing body that is not faster than the leader only needs the
    /// baseline gap.
    pub fn margin(&self, v_back: f64, v_front: f64, latency: f64) -> f64 {
        if v_back > v_front {
            let time = (v_back - v_front) / self.deceleration + latency;
            let candidate = v_back * time + 2.0 * self.car_safety_length;
            candidate.max(self.min_gap)
        } else {
            self.min_gap
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Following kinematics relative to the leader in the ego's lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoKinematics {
    /// Ego speed (m/s)
    pub speed: f64,

    /// Leader speed, or the configured max speed without a leader (m/s)
    pub leader_speed: f64,

    /// Leader distance, infinite without a leader (m)
    pub leader_distance: f64,

    /// Seconds until contact at constant speeds; infinite if not closing
    pub time_to_collision: f64,

    /// Seconds needed to slow to the leader's speed
    pub time_to_decelerate: f64,

    /// Seconds needed to come to a full stop
    pub time_to_stop: f64,

    /// Gap needed to match the leader's speed (m)
    pub safety_distance: f64,

    /// Gap needed to stop completely, ignoring the leader (m)
    pub paranoid_safety_distance: f64,
}

/// Lane-change margins for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneMargins {
    /// Speed used for the front neighbor (m/s)
    pub front_velocity: f64,

    /// Minimum admissible gap to the front neighbor (m)
    pub front: f64,

    /// Speed used for the back neighbor (m/s)
    pub back_velocity: f64,

    /// Minimum admissible gap to the back neighbor (m)
    pub back: f64,
}

/// All safety margins for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMarginSet {
    pub ego: EgoKinematics,
    lanes: PerLane<LaneMargins>,
}

impl SafetyMarginSet {
    pub fn lane(&self, lane: LaneIndex) -> &LaneMargins {
        &self.lanes[lane]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LaneIndex, &LaneMargins)> {
        self.lanes.iter()
    }
}

// ============================================================================
// CALCULATOR
// ============================================================================

/// Computes ego-lane kinematics and per-lane lane-change margins.
///
/// `ego_lane` selects whose leader drives the following quantities; without
/// one the ego is treated as having open road ahead.
pub fn compute_margins(
    ego: &EgoState,
    ego_lane: Option<LaneIndex>,
    neighbors: &NearestNeighborTable,
    config: &OccupancyConfig,
) -> SafetyMarginSet {
    let model = MarginModel::from_config(config);
    let decel = model.deceleration;
    let two_l = 2.0 * config.car_safety_length;
    let max_speed = config.max_speed();

    let v_ego = ego.speed_mps(config.ego_speed_unit);
    let leader = ego_lane.and_then(|lane| neighbors.lane(lane).front);
    let v_front = leader.map_or(max_speed, |n| n.speed);
    let d_front = leader.map_or(f64::INFINITY, |n| n.distance);

    let (time_to_collision, time_to_decelerate, safety_distance) = if v_ego > v_front {
        let closing = v_ego - v_front;
        let ttd = closing / decel;
        (d_front / closing, ttd, v_ego * ttd + two_l)
    } else {
        (f64::INFINITY, 0.0, two_l)
    };

    let time_to_stop = v_ego / decel;
    let ego_kinematics = EgoKinematics {
        speed: v_ego,
        leader_speed: v_front,
        leader_distance: d_front,
        time_to_collision,
        time_to_decelerate,
        time_to_stop,
        safety_distance,
        paranoid_safety_distance: v_ego * time_to_stop + two_l,
    };

    trace!(
        d = d_front,
        dv = v_ego - v_front,
        ttc = time_to_collision,
        ttd = time_to_decelerate,
        sd = safety_distance,
        psd = ego_kinematics.paranoid_safety_distance,
        "ego-lane safety"
    );

    let lanes = PerLane::from_fn(|lane| {
        let n = neighbors.lane(lane);
        let front_velocity = n.front.map_or(max_speed, |f| f.speed);
        let back_velocity = n.back.map_or(0.0, |b| b.speed);

        LaneMargins {
            front_velocity,
            front: model.margin(v_ego, front_velocity, 0.0),
            back_velocity,
            back: model.margin(back_velocity, v_ego, config.back_latency),
        }
    });

    SafetyMarginSet {
        ego: ego_kinematics,
        lanes,
    }
}
