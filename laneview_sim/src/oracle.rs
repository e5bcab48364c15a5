//! Ground truth oracle for the ring-road simulation.
//!
//! The Oracle maintains the "God's eye view" of the corridor:
//! - True Frenet state of every traffic vehicle
//! - Constant-speed kinematics with `s` wrapping at `max_s`
//! - Sensor fusion row generation (with Gaussian noise and garbage rows)
//!
//! The corridor is drawn as a circle of circumference `max_s`, so world
//! `x, y, vx, vy` are consistent with `s, d` and the speed magnitude.

use laneview_core::LaneIndex;
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

/// Lateral offset used for garbage rows, well outside any lane.
const GARBAGE_D: f64 = 42.0;

/// Circular corridor geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingRoad {
    /// Circumference in meters
    pub max_s: f64,

    /// Lane width in meters
    pub lane_width: f64,

    /// World-frame center of the ring
    pub center: Vector2<f64>,
}

impl RingRoad {
    pub fn new(max_s: f64, lane_width: f64) -> Self {
        Self {
            max_s,
            lane_width,
            center: Vector2::new(1000.0, 1000.0),
        }
    }

    fn radius(&self) -> f64 {
        self.max_s / TAU
    }

    /// World position for a Frenet coordinate. `d` grows toward the outside.
    pub fn to_world(&self, s: f64, d: f64) -> Vector2<f64> {
        let theta = s / self.radius();
        let r = self.radius() + d;
        self.center + Vector2::new(theta.cos(), theta.sin()) * r
    }

    /// World velocity for a vehicle moving along `s` at `speed`.
    pub fn velocity(&self, s: f64, speed: f64) -> Vector2<f64> {
        let theta = s / self.radius();
        Vector2::new(-theta.sin(), theta.cos()) * speed
    }

    /// Wraps `s` into `[0, max_s)`.
    pub fn wrap(&self, s: f64) -> f64 {
        s.rem_euclid(self.max_s)
    }
}

/// A ground truth vehicle on the corridor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficVehicle {
    /// Unique vehicle ID
    pub id: u64,

    /// Longitudinal position (m)
    pub s: f64,

    /// Lateral position (m)
    pub d: f64,

    /// Speed along the corridor (m/s)
    pub speed: f64,

    /// Vehicle is active (not removed)
    pub active: bool,
}

/// The Oracle - maintains ground truth and generates sensor fusion rows.
pub struct Oracle {
    road: RingRoad,

    /// RNG for measurement noise and garbage rows
    physics_rng: ChaCha8Rng,

    /// Vehicles keyed by ID (ordered for deterministic iteration)
    vehicles: BTreeMap<u64, TrafficVehicle>,

    next_id: u64,

    current_time: f64,

    /// Longitudinal/lateral noise standard deviation (m)
    position_noise_std: f64,

    /// Velocity noise standard deviation (m/s)
    velocity_noise_std: f64,

    /// Probability that a snapshot row carries a garbage lateral coordinate
    garbage_rate: f64,

    /// Garbage rows emitted so far
    garbage_rows: u64,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    pub fn new(physics_seed: u64, road: RingRoad) -> Self {
        Self {
            road,
            physics_rng: ChaCha8Rng::seed_from_u64(physics_seed),
            vehicles: BTreeMap::new(),
            next_id: 0,
            current_time: 0.0,
            position_noise_std: 0.5,
            velocity_noise_std: 0.2,
            garbage_rate: 0.0,
            garbage_rows: 0,
        }
    }

    pub fn set_position_noise(&mut self, std_dev: f64) {
        self.position_noise_std = std_dev;
    }

    pub fn set_velocity_noise(&mut self, std_dev: f64) {
        self.velocity_noise_std = std_dev;
    }

    /// Sets the fraction of rows replaced by off-road garbage.
    pub fn set_garbage_rate(&mut self, rate: f64) {
        self.garbage_rate = rate.clamp(0.0, 1.0);
    }

    pub fn road(&self) -> &RingRoad {
        &self.road
    }

    /// Spawns a vehicle centered in `lane` and returns its ID.
    pub fn spawn_vehicle(&mut self, s: f64, lane: LaneIndex, speed: f64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let vehicle = TrafficVehicle {
            id,
            s: self.road.wrap(s),
            d: lane.center_d(self.road.lane_width),
            speed,
            active: true,
        };
        self.vehicles.insert(id, vehicle);

        id
    }

    /// Moves a vehicle to the center of another lane instantly.
    pub fn change_lane(&mut self, id: u64, lane: LaneIndex) {
        let lane_width = self.road.lane_width;
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.d = lane.center_d(lane_width);
        }
    }

    pub fn set_speed(&mut self, id: u64, speed: f64) {
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.speed = speed.max(0.0);
        }
    }

    pub fn remove_vehicle(&mut self, id: u64) {
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.active = false;
        }
    }

    /// Advances physics by dt seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;

        let road = self.road;
        for vehicle in self.vehicles.values_mut() {
            if vehicle.active {
                vehicle.s = road.wrap(vehicle.s + vehicle.speed * dt);
            }
        }
    }

    pub fn time(&self) -> f64 {
        self.current_time
    }

    pub fn vehicle(&self, id: u64) -> Option<&TrafficVehicle> {
        self.vehicles.get(&id)
    }

    pub fn active_vehicles(&self) -> Vec<&TrafficVehicle> {
        self.vehicles.values().filter(|v| v.active).collect()
    }

    pub fn garbage_rows(&self) -> u64 {
        self.garbage_rows
    }

    fn sample_noise(&mut self, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return 0.0;
        }
        match Normal::new(0.0, std_dev) {
            Ok(normal) => normal.sample(&mut self.physics_rng),
            Err(_) => 0.0,
        }
    }

    /// Generates one cycle of sensor fusion rows `[id, x, y, vx, vy, s, d]`.
    pub fn generate_snapshot(&mut self) -> Vec<[f64; 7]> {
        let truth: Vec<TrafficVehicle> = self
            .vehicles
            .values()
            .filter(|v| v.active)
            .cloned()
            .collect();

        let mut rows = Vec::with_capacity(truth.len());
        for vehicle in truth {
            let s_noise = self.sample_noise(self.position_noise_std);
            let d_noise = self.sample_noise(self.position_noise_std);
            let v_noise = self.sample_noise(self.velocity_noise_std);

            let s = self.road.wrap(vehicle.s + s_noise);
            let mut d = vehicle.d + d_noise;
            let speed = (vehicle.speed + v_noise).max(0.0);

            if self.garbage_rate > 0.0 && self.physics_rng.gen_bool(self.garbage_rate) {
                d = if self.physics_rng.gen_bool(0.5) { GARBAGE_D } else { -GARBAGE_D };
                self.garbage_rows += 1;
            }

            let position = self.road.to_world(s, d);
            let velocity = self.road.velocity(s, speed);
            rows.push([
                vehicle.id as f64,
                position.x,
                position.y,
                velocity.x,
                velocity.y,
                s,
                d,
            ]);
        }

        rows
    }
}
