//! Per-cycle inputs: the sensor fusion snapshot and the ego state.
//!
//! The snapshot arrives as fixed-width numeric rows
//! `[id, x, y, vx, vy, s, d]`. Rows are decoded once into
//! [`ObjectObservation`]s; nothing here outlives a planning cycle.

use crate::config::SpeedUnit;
use crate::error::SnapshotError;
use crate::lane::LaneIndex;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of fields in a sensor fusion row.
pub const ROW_WIDTH: usize = 7;

/// Identifier assigned to an object by the perception pipeline.
pub type ObjectId = i64;

/// One row of the sensor fusion snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectObservation {
    /// Perception-assigned identifier
    pub id: ObjectId,

    /// World-frame position [x, y] in meters
    pub position: Vector2<f64>,

    /// World-frame velocity [vx, vy] in m/s
    pub velocity: Vector2<f64>,

    /// Longitudinal corridor coordinate
    pub s: f64,

    /// Lateral corridor coordinate
    pub d: f64,
}

impl ObjectObservation {
    /// Decodes a raw `[id, x, y, vx, vy, s, d]` row.
    ///
    /// Returns `None` if the row is shorter than [`ROW_WIDTH`]; extra
    /// trailing fields are ignored.
    pub fn from_row(row: &[f64]) -> Option<Self> {
        if row.len() < ROW_WIDTH {
            return None;
        }
        Some(Self {
            id: row[0] as ObjectId,
            position: Vector2::new(row[1], row[2]),
            velocity: Vector2::new(row[3], row[4]),
            s: row[5],
            d: row[6],
        })
    }

    /// Encodes back into the raw row layout.
    pub fn to_row(&self) -> [f64; ROW_WIDTH] {
        [
            self.id as f64,
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
            self.s,
            self.d,
        ]
    }

    /// Speed as the magnitude of the velocity vector (m/s).
    #[inline]
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Lane derived from the lateral coordinate, `None` when off-road.
    #[inline]
    pub fn lane(&self, lane_width: f64) -> Option<LaneIndex> {
        LaneIndex::from_d(self.d, lane_width)
    }
}

/// The full set of observations for one planning cycle, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    observations: Vec<ObjectObservation>,
}

impl Snapshot {
    /// Wraps already-decoded observations.
    pub fn new(observations: Vec<ObjectObservation>) -> Self {
        Self { observations }
    }

    /// Decodes raw rows, skipping any that are too short to read.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let mut observations = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            match ObjectObservation::from_row(row) {
                Some(obs) => observations.push(obs),
                None => debug!(index, len = row.len(), "skipping short sensor fusion row"),
            }
        }
        Self { observations }
    }

    /// Decodes raw rows, rejecting the snapshot on the first short row.
    pub fn try_from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, SnapshotError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let row = row.as_ref();
                ObjectObservation::from_row(row).ok_or(SnapshotError::RowTooShort {
                    index,
                    len: row.len(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Parses the JSON array-of-rows form `[[id, x, y, vx, vy, s, d], ...]`.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let rows: Vec<Vec<f64>> = serde_json::from_str(json)?;
        Self::try_from_rows(&rows)
    }

    /// Returns the observation at `index`.
    pub fn get(&self, index: usize) -> Option<&ObjectObservation> {
        self.observations.get(index)
    }

    pub fn observations(&self) -> &[ObjectObservation] {
        &self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectObservation> {
        self.observations.iter()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl FromIterator<ObjectObservation> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ObjectObservation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Ego vehicle state, supplied fresh by the caller every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoState {
    /// Longitudinal corridor coordinate
    pub s: f64,

    /// Lateral corridor coordinate
    pub d: f64,

    /// Current speed, in the configured [`SpeedUnit`]
    pub speed: f64,

    /// Lane the behavior layer considers the ego to be in
    pub lane: i64,
}

impl EgoState {
    pub fn new(s: f64, d: f64, speed: f64, lane: i64) -> Self {
        Self { s, d, speed, lane }
    }

    /// Ego speed converted to m/s.
    #[inline]
    pub fn speed_mps(&self, unit: SpeedUnit) -> f64 {
        unit.to_mps(self.speed)
    }

    /// The behavior-layer lane, if it names a valid lane.
    pub fn planned_lane(&self) -> Option<LaneIndex> {
        LaneIndex::new(self.lane)
    }

    /// The lane the ego physically occupies according to `d`.
    pub fn physical_lane(&self, lane_width: f64) -> Option<LaneIndex> {
        LaneIndex::from_d(self.d, lane_width)
    }
}
