//! The "GEOMETRY" Engine - Longitudinal Nearest-Neighbor Resolution
//!
//! Finds, for every lane, the closest object ahead of and behind the ego
//! vehicle inside a finite field of view.
//!
//! The corridor's `s` coordinate is circular with period `max_s`. Comparing
//! coordinates across the seam would put an object one meter behind the
//! finish line five kilometers ahead of an ego that just crossed it. The
//! [`WrapShift`] transform moves the whole sensing window away from the seam
//! before any comparison is made.

use crate::config::OccupancyConfig;
use crate::lane::{LaneIndex, PerLane};
use crate::observation::{EgoState, ObjectId, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// WRAP SHIFT
// ============================================================================

/// Constant offset that moves the sensing window clear of the `s` seam.
///
/// Applied identically to the ego coordinate, both window bounds and every
/// candidate coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapShift {
    offset: f64,
    max_s: f64,
    window_min: f64,
    window_max: f64,
    ego_s: f64,
}

impl WrapShift {
    /// Builds the shift for a window of `radius` around `ego_s`.
    ///
    /// # Panics
    /// If the shifted window does not lie inside `[0, max_s]`, which can
    /// only happen when `2 * radius >= max_s`.
    pub fn new(ego_s: f64, radius: f64, max_s: f64) -> Self {
        let ego_s = ego_s.rem_euclid(max_s);
        let mut window_min = ego_s - radius;
        let mut window_max = ego_s + radius;

        let offset = if window_min < 0.0 {
            -window_min
        } else if window_max > max_s {
            max_s - window_max
        } else {
            0.0
        };

        window_min += offset;
        window_max += offset;

        assert!(
            (0.0..=max_s).contains(&window_min) && (0.0..=max_s).contains(&window_max),
            "sensing window [{}, {}] escapes corridor [0, {}]",
            window_min,
            window_max,
            max_s
        );

        Self {
            offset,
            max_s,
            window_min,
            window_max,
            ego_s: ego_s + offset,
        }
    }

    /// Shifts a raw corridor coordinate into the window's frame.
    #[inline]
    pub fn apply(&self, s: f64) -> f64 {
        (s + self.offset).rem_euclid(self.max_s)
    }

    /// Whether a shifted coordinate falls inside the sensing window.
    #[inline]
    pub fn contains(&self, shifted_s: f64) -> bool {
        shifted_s >= self.window_min && shifted_s <= self.window_max
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Ego coordinate in the shifted frame.
    pub fn ego_s(&self) -> f64 {
        self.ego_s
    }

    /// Shifted window bounds `(min, max)`.
    pub fn window(&self) -> (f64, f64) {
        (self.window_min, self.window_max)
    }
}

// ============================================================================
// NEIGHBOR TABLE
// ============================================================================

/// The nearest object on one side of the ego in one lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row index in the snapshot
    pub index: usize,

    /// Perception identifier
    pub id: ObjectId,

    /// Absolute longitudinal distance to the ego (m)
    pub distance: f64,

    /// Velocity magnitude (m/s)
    pub speed: f64,
}

/// Front and back nearest neighbors of a single lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneNeighbors {
    pub front: Option<Neighbor>,
    pub back: Option<Neighbor>,
}

impl LaneNeighbors {
    /// Distance to the front neighbor, infinite when there is none.
    pub fn front_distance(&self) -> f64 {
        self.front.map_or(f64::INFINITY, |n| n.distance)
    }

    /// Distance to the back neighbor, infinite when there is none.
    pub fn back_distance(&self) -> f64 {
        self.back.map_or(f64::INFINITY, |n| n.distance)
    }

    fn offer_front(&mut self, candidate: Neighbor) {
        if candidate.distance < self.front_distance() {
            self.front = Some(candidate);
        }
    }

    fn offer_back(&mut self, candidate: Neighbor) {
        if candidate.distance < self.back_distance() {
            self.back = Some(candidate);
        }
    }
}

/// Per-lane nearest objects ahead and behind for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighborTable {
    lanes: PerLane<LaneNeighbors>,
}

impl NearestNeighborTable {
    pub fn lane(&self, lane: LaneIndex) -> &LaneNeighbors {
        &self.lanes[lane]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LaneIndex, &LaneNeighbors)> {
        self.lanes.iter()
    }

    /// Identifiers of the (at most six) relevant objects, ordered
    /// `front0, back0, front1, back1, ...` with empty slots omitted.
    pub fn closest_objects(&self) -> Vec<ObjectId> {
        self.lanes
            .iter()
            .flat_map(|(_, n)| [n.front, n.back])
            .flatten()
            .map(|n| n.id)
            .collect()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Locates the nearest front and back object in every lane.
///
/// Observations outside the field of view are ignored, as are observations
/// whose lateral coordinate maps to no lane (perception noise). Ties keep the
/// first observation seen.
pub fn locate_neighbors(
    snapshot: &Snapshot,
    ego: &EgoState,
    config: &OccupancyConfig,
) -> NearestNeighborTable {
    let shift = WrapShift::new(ego.s, config.field_of_view, config.max_s);
    let ego_s = shift.ego_s();
    let mut table = NearestNeighborTable::default();

    for (index, obs) in snapshot.iter().enumerate() {
        let s = shift.apply(obs.s);
        if !shift.contains(s) {
            continue;
        }

        let Some(lane) = obs.lane(config.lane_width) else {
            debug!(id = obs.id, d = obs.d, "discarding observation outside lane range");
            continue;
        };

        let candidate = Neighbor {
            index,
            id: obs.id,
            distance: (s - ego_s).abs(),
            speed: obs.speed(),
        };

        if s >= ego_s {
            table.lanes[lane].offer_front(candidate);
        } else {
            table.lanes[lane].offer_back(candidate);
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObjectObservation;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn obs(id: i64, s: f64, d: f64, vx: f64) -> ObjectObservation {
        ObjectObservation {
            id,
            position: Vector2::zeros(),
            velocity: Vector2::new(vx, 0.0),
            s,
            d,
        }
    }

    fn lane(i: i64) -> LaneIndex {
        LaneIndex::new(i).unwrap()
    }

    #[test]
    fn test_shift_interior_window() {
        let shift = WrapShift::new(500.0, 70.0, 6945.554);

        assert_eq!(shift.offset(), 0.0);
        assert_eq!(shift.window(), (430.0, 570.0));
        assert_eq!(shift.apply(510.0), 510.0);
    }

    #[test]
    fn test_shift_near_start() {
        let shift = WrapShift::new(10.0, 70.0, 1000.0);

        assert_relative_eq!(shift.offset(), 60.0);
        assert_relative_eq!(shift.ego_s(), 70.0);
        assert_relative_eq!(shift.window().0, 0.0);
        assert_relative_eq!(shift.window().1, 140.0);

        // Object 20m behind across the seam
        let behind = shift.apply(990.0);
        assert!(shift.contains(behind));
        assert_relative_eq!(behind, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shift_near_end() {
        let shift = WrapShift::new(980.0, 70.0, 1000.0);

        assert_relative_eq!(shift.offset(), -50.0);
        assert_relative_eq!(shift.window().1, 1000.0);

        // Object 30m ahead across the seam
        let ahead = shift.apply(10.0);
        assert!(shift.contains(ahead));
        assert_relative_eq!(ahead - shift.ego_s(), 30.0, epsilon = 1e-9);
    }

    #[test]
    #[should_panic(expected = "escapes corridor")]
    fn test_shift_window_too_large() {
        WrapShift::new(50.0, 80.0, 100.0);
    }

    #[test]
    fn test_nearest_per_lane() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 0.0, 1);
        let snapshot = Snapshot::new(vec![
            obs(0, 140.0, 2.0, 10.0),
            obs(1, 120.0, 2.0, 12.0),
            obs(2, 90.0, 2.0, 8.0),
            obs(3, 60.0, 2.0, 8.0),
            obs(4, 105.0, 10.0, 20.0),
            obs(5, 300.0, 6.0, 20.0), // outside FOV
        ]);

        let table = locate_neighbors(&snapshot, &ego, &config);

        let l0 = table.lane(lane(0));
        assert_eq!(l0.front.map(|n| n.id), Some(1));
        assert_relative_eq!(l0.front_distance(), 20.0);
        assert_relative_eq!(l0.front.unwrap().speed, 12.0);
        assert_eq!(l0.back.map(|n| n.id), Some(2));
        assert_relative_eq!(l0.back_distance(), 10.0);

        let l1 = table.lane(lane(1));
        assert!(l1.front.is_none());
        assert!(l1.back.is_none());
        assert_eq!(l1.front_distance(), f64::INFINITY);

        assert_eq!(table.lane(lane(2)).front.map(|n| n.id), Some(4));
        assert_eq!(table.closest_objects(), vec![1, 2, 4]);
    }

    #[test]
    fn test_noise_rows_are_skipped() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 0.0, 1);
        let snapshot = Snapshot::new(vec![obs(0, 110.0, -3.0, 5.0), obs(1, 110.0, 40.0, 5.0)]);

        let table = locate_neighbors(&snapshot, &ego, &config);

        assert!(table.closest_objects().is_empty());
    }

    #[test]
    fn test_object_at_ego_position_is_front() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 0.0, 1);
        let snapshot = Snapshot::new(vec![obs(0, 100.0, 2.0, 5.0)]);

        let table = locate_neighbors(&snapshot, &ego, &config);

        assert_eq!(table.lane(lane(0)).front.map(|n| n.distance), Some(0.0));
        assert!(table.lane(lane(0)).back.is_none());
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(100.0, 6.0, 0.0, 1);
        let snapshot = Snapshot::new(vec![obs(7, 115.0, 6.0, 5.0), obs(8, 115.0, 7.0, 9.0)]);

        let table = locate_neighbors(&snapshot, &ego, &config);

        assert_eq!(table.lane(lane(1)).front.map(|n| n.id), Some(7));
    }

    #[test]
    fn test_wraparound_neighbor_detected() {
        let config = OccupancyConfig::default();
        let ego = EgoState::new(1.0, 6.0, 0.0, 1);
        let snapshot = Snapshot::new(vec![obs(0, config.max_s - 1.0, 6.0, 5.0)]);

        let table = locate_neighbors(&snapshot, &ego, &config);

        let back = table.lane(lane(1)).back.expect("seam neighbor must be found");
        assert_relative_eq!(back.distance, 2.0, epsilon = 1e-9);
    }
}
