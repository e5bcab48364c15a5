//! LaneView Deterministic Simulation Harness
//!
//! Drives the occupancy engine around a closed three-lane ring road whose
//! traffic is fully controlled by a single 64-bit seed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        SimWorld                         │
//! │                                                         │
//! │  ┌────────────┐  snapshot   ┌──────────────────────┐    │
//! │  │   Oracle   │────────────►│    LaneOccupancy     │    │
//! │  │ (ring road │   rows      │  (laneview_core)     │    │
//! │  │  traffic)  │             └──────────┬───────────┘    │
//! │  └────────────┘                        │                │
//! │        ▲                    ┌──────────▼───────────┐    │
//! │        │ ego drives         │  InvariantChecker    │    │
//! │        └────────────────────┤  (per-cycle checks)  │    │
//! │                             └──────────────────────┘    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use laneview_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(1.0)
//!     .run(ScenarioId::OpenRoad);
//! assert!(result.passed);
//! ```

mod error;
mod exporter;
mod invariants;
mod oracle;
mod runner;
pub mod scenarios;
mod world;

pub use error::SimError;
pub use exporter::{EgoFrame, LaneFrame, SimEvent, SimExport, SimFrame, VehiclePosition};
pub use invariants::{InvariantChecker, Violation, ViolationKind};
pub use oracle::{Oracle, RingRoad, TrafficVehicle};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{Cycle, EgoVehicle, SimConfig, SimWorld};
