//! # Simulated plant
//!
//! A kinematic stand-in for the robot used when the exec runs off-robot and by the tests. Every
//! simulated device shares state with the [`SimPlant`] through an `Arc<Mutex<_>>`, so the
//! subsystems can own their devices while the plant integrates motion in the background.
//!
//! The drive model is a skid steer: each side's wheel speed is proportional to its motor power and
//! the yaw rate to half the difference between left and right.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod devices;

pub use devices::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};

use comms_if::eqpt::{AngleSensor, ControlMode, MotorOutput};
use util::maths::{abs_limit, wrap_deg_180};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimPlantParams {
    /// Wheel speed at full power.
    ///
    /// Units: counts/second
    pub full_speed_counts_s: f64,

    /// Yaw rate when the left and right sides are at full power in opposite directions.
    ///
    /// Units: degrees/second
    pub yaw_rate_deg_s: f64,

    /// Current drawn by a motor at full power, with no extra load.
    ///
    /// Units: amps
    pub amps_at_full_power: f64,
}

/// The shared simulation.
#[derive(Clone)]
pub struct SimPlant {
    params: SimPlantParams,
    state: Arc<Mutex<PlantState>>,
}

/// A simulated smart motor controller. Clones are handles onto the same motor.
#[derive(Clone)]
pub struct SimMotor {
    idx: usize,
    full_speed_counts_s: f64,
    amps_at_full_power: f64,
    state: Arc<Mutex<PlantState>>,
}

/// The simulated gyro, reporting the plant's heading.
#[derive(Clone)]
pub struct SimGyro {
    state: Arc<Mutex<PlantState>>,
}

#[derive(Debug, Default)]
struct PlantState {
    motors: Vec<MotorState>,

    /// Indices of the left and right drive motors, once attached
    drive: Option<(usize, usize)>,

    heading_deg: f64,
    rate_deg_s: f64,

    /// Constant disturbance added to the yaw rate
    yaw_bias_deg_s: f64,
}

#[derive(Debug)]
struct MotorState {
    mode: ControlMode,
    demand: f64,
    position: f64,
    velocity: f64,
    load_current_a: f64,
    enabled: bool,
    brake: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimPlantParams {
    fn default() -> Self {
        Self {
            full_speed_counts_s: 2800.0,
            yaw_rate_deg_s: 720.0,
            amps_at_full_power: 20.0,
        }
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self {
            mode: ControlMode::Power,
            demand: 0.0,
            position: 0.0,
            velocity: 0.0,
            load_current_a: 0.0,
            enabled: true,
            brake: false,
        }
    }
}

impl MotorState {
    /// Fraction of full power the motor is currently delivering.
    fn power(&self, full_speed_counts_s: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }

        let p = match self.mode {
            ControlMode::Power => self.demand,
            ControlMode::Velocity => self.demand / full_speed_counts_s,
        };

        abs_limit(p, 1.0)
    }
}

impl SimPlant {
    pub fn new(params: SimPlantParams) -> Self {
        Self {
            params,
            state: Arc::new(Mutex::new(PlantState::default())),
        }
    }

    pub fn params(&self) -> &SimPlantParams {
        &self.params
    }

    /// Add a motor which is not part of the drive base.
    pub fn add_motor(&self) -> SimMotor {
        let mut state = lock(&self.state);
        state.motors.push(MotorState::default());

        SimMotor {
            idx: state.motors.len() - 1,
            full_speed_counts_s: self.params.full_speed_counts_s,
            amps_at_full_power: self.params.amps_at_full_power,
            state: self.state.clone(),
        }
    }

    /// Add the left and right drive motors.
    pub fn drive_motors(&self) -> (SimMotor, SimMotor) {
        let left = self.add_motor();
        let right = self.add_motor();

        let mut state = lock(&self.state);
        if state.drive.is_some() {
            warn!("Simulated drive motors attached twice, the newest pair moves the plant");
        }
        state.drive = Some((left.idx, right.idx));

        (left, right)
    }

    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            state: self.state.clone(),
        }
    }

    /// Constant yaw disturbance, as if one side of the drive were dragging.
    pub fn set_yaw_bias(&self, bias_deg_s: f64) {
        lock(&self.state).yaw_bias_deg_s = bias_deg_s;
    }

    /// Extra current drawn by a motor on top of its free running current.
    pub fn set_load_current(&self, motor: &SimMotor, current_a: f64) {
        if let Some(m) = lock(&self.state).motors.get_mut(motor.idx) {
            m.load_current_a = current_a;
        }
    }

    pub fn heading_deg(&self) -> f64 {
        lock(&self.state).heading_deg
    }

    /// Integrate the plant forward by `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        let full_speed = self.params.full_speed_counts_s;
        let mut state = lock(&self.state);

        for m in state.motors.iter_mut() {
            m.velocity = m.power(full_speed) * full_speed;
            m.position += m.velocity * dt_s;
        }

        let (left_power, right_power) = match state.drive {
            Some((l, r)) => (
                state.motors[l].power(full_speed),
                state.motors[r].power(full_speed),
            ),
            None => (0.0, 0.0),
        };

        // Positive clockwise, so left faster than right turns right
        state.rate_deg_s =
            (left_power - right_power) / 2.0 * self.params.yaw_rate_deg_s + state.yaw_bias_deg_s;
        state.heading_deg += state.rate_deg_s * dt_s;
    }
}

impl SimMotor {
    /// The current demand, in whatever units the control mode uses.
    pub fn demand(&self) -> f64 {
        self.read(|m| m.demand).unwrap_or(0.0)
    }

    pub fn control_mode(&self) -> ControlMode {
        self.read(|m| m.mode).unwrap_or(ControlMode::Power)
    }

    pub fn is_braking(&self) -> bool {
        self.read(|m| m.brake).unwrap_or(false)
    }

    fn read<T, F: Fn(&MotorState) -> T>(&self, f: F) -> Option<T> {
        lock(&self.state).motors.get(self.idx).map(f)
    }

    fn write<F: FnOnce(&mut MotorState)>(&self, f: F) {
        if let Some(m) = lock(&self.state).motors.get_mut(self.idx) {
            f(m)
        }
    }
}

impl MotorOutput for SimMotor {
    fn set_control_mode(&mut self, mode: ControlMode) {
        self.write(|m| m.mode = mode)
    }

    fn set(&mut self, value: f64) {
        self.write(|m| m.demand = value)
    }

    fn position(&self) -> f64 {
        self.read(|m| m.position).unwrap_or(0.0)
    }

    fn velocity(&self) -> f64 {
        self.read(|m| m.velocity).unwrap_or(0.0)
    }

    fn supply_current(&self) -> f64 {
        let full_speed = self.full_speed_counts_s;
        let amps_at_full = self.amps_at_full_power;

        self.read(|m| match m.enabled {
            true => m.power(full_speed).abs() * amps_at_full + m.load_current_a,
            false => 0.0,
        })
        .unwrap_or(0.0)
    }

    fn set_brake_mode(&mut self, brake: bool) {
        self.write(|m| m.brake = brake)
    }

    fn enable(&mut self) {
        self.write(|m| m.enabled = true)
    }

    fn disable(&mut self) {
        self.write(|m| m.enabled = false)
    }

    fn is_enabled(&self) -> bool {
        self.read(|m| m.enabled).unwrap_or(false)
    }
}

impl AngleSensor for SimGyro {
    fn heading_deg(&self) -> f64 {
        lock(&self.state).heading_deg
    }

    fn rate_deg_s(&self) -> f64 {
        lock(&self.state).rate_deg_s
    }

    fn zero(&self) {
        lock(&self.state).heading_deg = 0.0;
    }

    fn set_heading(&self, heading_deg: f64) {
        lock(&self.state).heading_deg = heading_deg;
    }
}

impl SimGyro {
    /// Offset of a fixed bearing from the current heading, in [-180, 180).
    pub fn bearing_offset_deg(&self, bearing_deg: f64) -> f64 {
        wrap_deg_180(bearing_deg - self.heading_deg())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Lock the plant, carrying on with the data if a panicking test thread poisoned it.
fn lock(state: &Arc<Mutex<PlantState>>) -> MutexGuard<'_, PlantState> {
    match state.lock() {
        Ok(s) => s,
        Err(p) => p.into_inner(),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
