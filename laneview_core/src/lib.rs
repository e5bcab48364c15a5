//! LaneView Core - Per-Lane Occupancy for Highway Motion Planning
//!
//! Once per planning cycle, this library turns a raw sensor fusion snapshot
//! and the ego vehicle's state into a per-lane table of achievable speed and
//! free space. It solves two problems:
//! 1. **Seam Problem**: nearest-neighbor search on a circular corridor whose
//!    `s` coordinate wraps at `max_s`, via a single window shift
//! 2. **Merge Problem**: kinematic safety margins from relative velocity and
//!    a conservative deceleration model, with a binary danger veto
//!
//! Each cycle is evaluated independently; nothing is carried between cycles.

pub mod config;
pub mod error;
pub mod lane;
pub mod observation;
pub mod laneview_geometry;
pub mod laneview_safety;
pub mod laneview_synthesis;
pub mod occupancy;

// Re-export key types for convenience
pub use config::{mph_to_mps, mps_to_mph, OccupancyConfig, SpeedUnit};
pub use error::{ConfigError, SnapshotError};
pub use lane::{LaneIndex, PerLane, LANE_COUNT};
pub use observation::{EgoState, ObjectId, ObjectObservation, Snapshot};
pub use laneview_geometry::{locate_neighbors, LaneNeighbors, NearestNeighborTable, Neighbor, WrapShift};
pub use laneview_safety::{compute_margins, EgoKinematics, LaneMargins, MarginModel, SafetyMarginSet};
pub use laneview_synthesis::{synthesize, LaneState, LaneStateTable};
pub use occupancy::LaneOccupancy;
