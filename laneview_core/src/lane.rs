//! Lane indexing for the fixed set of parallel lanes.
//!
//! Every per-lane quantity in LaneView is stored in a [`PerLane`] arena of
//! exactly [`LANE_COUNT`] slots and addressed through a validated
//! [`LaneIndex`], so an out-of-range lane can never reach an array access.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Number of parallel lanes on the corridor.
pub const LANE_COUNT: usize = 3;

/// A lane index known to be in `0..LANE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneIndex(u8);

impl LaneIndex {
    /// Validates a raw lane number. Negative or too-large values yield `None`.
    pub fn new(index: i64) -> Option<Self> {
        if (0..LANE_COUNT as i64).contains(&index) {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// The valid lane nearest to `index`.
    pub fn clamped(index: i64) -> Self {
        Self(index.clamp(0, LANE_COUNT as i64 - 1) as u8)
    }

    /// Derives the lane from a lateral (Frenet `d`) coordinate.
    ///
    /// Uses floor division so that a slightly negative `d` (left of the
    /// road edge) maps to lane -1 and is rejected instead of being folded
    /// into lane 0.
    pub fn from_d(d: f64, lane_width: f64) -> Option<Self> {
        if !d.is_finite() || lane_width <= 0.0 {
            return None;
        }
        let raw = (d / lane_width).floor();
        if raw < 0.0 || raw >= LANE_COUNT as f64 {
            return None;
        }
        Some(Self(raw as u8))
    }

    /// Iterates over every lane, left to right.
    pub fn all() -> impl Iterator<Item = LaneIndex> {
        (0..LANE_COUNT as u8).map(LaneIndex)
    }

    /// Returns the index as a `usize`.
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Lateral coordinate of the lane center.
    pub fn center_d(self, lane_width: f64) -> f64 {
        lane_width * (self.0 as f64 + 0.5)
    }
}

impl std::fmt::Display for LaneIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lane {}", self.0)
    }
}

/// Fixed-arity storage with one slot per lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerLane<T>([T; LANE_COUNT]);

impl<T> PerLane<T> {
    /// Builds the arena by calling `f` once per lane.
    pub fn from_fn(mut f: impl FnMut(LaneIndex) -> T) -> Self {
        Self(std::array::from_fn(|i| f(LaneIndex(i as u8))))
    }

    /// Iterates `(lane, value)` pairs in lane order.
    pub fn iter(&self) -> impl Iterator<Item = (LaneIndex, &T)> {
        self.0.iter().enumerate().map(|(i, v)| (LaneIndex(i as u8), v))
    }

    /// Looks up a raw lane number, returning `None` when it is out of range.
    pub fn get(&self, lane: i64) -> Option<&T> {
        LaneIndex::new(lane).map(|lane| &self[lane])
    }
}

impl<T: Default> Default for PerLane<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<LaneIndex> for PerLane<T> {
    type Output = T;

    #[inline]
    fn index(&self, lane: LaneIndex) -> &T {
        &self.0[lane.get()]
    }
}

impl<T> IndexMut<LaneIndex> for PerLane<T> {
    #[inline]
    fn index_mut(&mut self, lane: LaneIndex) -> &mut T {
        &mut self.0[lane.get()]
    }
}
