//! SimWorld - The simulation harness container.
//!
//! Each tick advances the traffic, builds a sensor fusion snapshot from the
//! oracle, evaluates [`LaneOccupancy`] for the ego, checks the result's
//! invariants, and finally lets the ego follow its lane using the published
//! speed and free space.

use crate::invariants::InvariantChecker;
use crate::oracle::{Oracle, RingRoad};

use laneview_core::{EgoState, LaneIndex, LaneOccupancy, OccupancyConfig, Snapshot};

/// Comfortable acceleration used when the lane allows a higher speed (m/s²).
const EGO_ACCELERATION: f64 = 3.0;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Tick rate in Hz
    pub tick_rate_hz: u32,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// Position noise standard deviation for sensor rows (m)
    pub sensor_noise_std: f64,

    /// Fraction of sensor rows replaced by off-road garbage
    pub garbage_rate: f64,

    /// Occupancy engine configuration
    pub occupancy: OccupancyConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 50,
            max_duration_secs: 10.0,
            sensor_noise_std: 0.3,
            garbage_rate: 0.0,
            occupancy: OccupancyConfig::default(),
        }
    }
}

/// The simulated ego vehicle.
#[derive(Debug, Clone, Copy)]
pub struct EgoVehicle {
    /// Longitudinal position (m)
    pub s: f64,

    /// Speed (m/s)
    pub speed: f64,

    /// Lane the ego drives in
    pub lane: LaneIndex,
}

/// Inputs and result of the most recent cycle.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub snapshot: Snapshot,
    pub ego: EgoState,
    pub occupancy: LaneOccupancy,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    pub config: SimConfig,

    /// Ground truth oracle
    pub oracle: Oracle,

    pub ego: EgoVehicle,

    checker: InvariantChecker,

    last_cycle: Option<Cycle>,

    tick_count: u64,

    /// Times the ego wrapped from `max_s` back to 0
    seam_crossings: u64,

    /// Smallest time-to-collision seen in the ego lane
    min_time_to_collision: f64,
}

impl SimWorld {
    /// Creates a new SimWorld with the ego at `ego_s` in `ego_lane`.
    pub fn new(config: SimConfig, ego_s: f64, ego_lane: LaneIndex, ego_speed: f64) -> Self {
        // Physics seed derived separately so scenario layout changes don't shift noise
        let physics_seed = config.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let road = RingRoad::new(config.occupancy.max_s, config.occupancy.lane_width);

        let mut oracle = Oracle::new(physics_seed, road);
        oracle.set_position_noise(config.sensor_noise_std);
        oracle.set_garbage_rate(config.garbage_rate);

        let ego = EgoVehicle {
            s: road.wrap(ego_s),
            speed: ego_speed.max(0.0),
            lane: ego_lane,
        };

        Self {
            config,
            oracle,
            ego,
            checker: InvariantChecker::new(),
            last_cycle: None,
            tick_count: 0,
            seam_crossings: 0,
            min_time_to_collision: f64::INFINITY,
        }
    }

    fn dt(&self) -> f64 {
        1.0 / self.config.tick_rate_hz as f64
    }

    /// The ego state as the localization layer would report it.
    pub fn ego_state(&self) -> EgoState {
        let occupancy = &self.config.occupancy;
        EgoState::new(
            self.ego.s,
            self.ego.lane.center_d(occupancy.lane_width),
            occupancy.ego_speed_unit.from_mps(self.ego.speed),
            self.ego.lane.get() as i64,
        )
    }

    /// Advances simulation by one tick.
    pub fn tick(&mut self) {
        let dt = self.dt();
        self.oracle.step(dt);

        let snapshot = Snapshot::from_rows(&self.oracle.generate_snapshot());
        let ego = self.ego_state();
        let occupancy = LaneOccupancy::evaluate(&snapshot, &ego, &self.config.occupancy);

        self.checker
            .check(self.tick_count, &snapshot, &ego, &occupancy, &self.config.occupancy);
        self.min_time_to_collision = self.min_time_to_collision.min(occupancy.time_to_collision());

        self.drive(&occupancy, dt);

        self.last_cycle = Some(Cycle {
            snapshot,
            ego,
            occupancy,
        });
        self.tick_count += 1;
    }

    /// Follows the ego lane: brake when free space is below the safety
    /// distance, otherwise approach the lane's achievable speed.
    fn drive(&mut self, occupancy: &LaneOccupancy, dt: f64) {
        let lane = self.ego.lane.get() as i64;
        let decel = self.config.occupancy.deceleration();
        let target = occupancy
            .lane_speed(lane)
            .min(self.config.occupancy.max_speed());

        let speed = self.ego.speed;
        let speed = if occupancy.lane_free_space(lane) < occupancy.safety_distance() {
            speed - decel * dt
        } else if speed < target {
            (speed + EGO_ACCELERATION * dt).min(target)
        } else {
            (speed - decel * dt).max(target)
        };
        self.ego.speed = speed.max(0.0);

        let previous = self.ego.s;
        self.ego.s = self.oracle.road().wrap(self.ego.s + self.ego.speed * dt);
        if self.ego.s < previous {
            self.seam_crossings += 1;
        }
    }

    /// Moves the ego into another lane.
    pub fn set_ego_lane(&mut self, lane: LaneIndex) {
        self.ego.lane = lane;
    }

    /// Ticks needed to cover `max_duration_secs`.
    pub fn target_ticks(&self) -> u64 {
        (self.config.max_duration_secs * self.config.tick_rate_hz as f64) as u64
    }

    /// Whether the run has reached its configured duration.
    pub fn is_finished(&self) -> bool {
        self.tick_count >= self.target_ticks()
    }

    pub fn time(&self) -> f64 {
        self.tick_count as f64 * self.dt()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn last_cycle(&self) -> Option<&Cycle> {
        self.last_cycle.as_ref()
    }

    pub fn checker(&self) -> &InvariantChecker {
        &self.checker
    }

    pub fn seam_crossings(&self) -> u64 {
        self.seam_crossings
    }

    pub fn min_time_to_collision(&self) -> f64 {
        self.min_time_to_collision
    }
}
