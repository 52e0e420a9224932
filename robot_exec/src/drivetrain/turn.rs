//! Closed loop turning on the gyro

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::Response;
use util::maths::wrap_deg_180;

use super::{Params, Sensors, Step};
use crate::pid::{PidController, PidOutput, PidSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TurnSession {
    /// Absolute heading to reach, in [-180, 180).
    ///
    /// Units: degrees
    pub target_deg: f64,

    /// Units: seconds
    pub timeout_s: f64,

    pub start_s: f64,

    pub reply_to: Option<String>,

    pid: PidController,
}

/// Reads how far the robot is past its target heading, normalised for the controller.
struct HeadingOffset {
    offset_deg: f64,
    normalisation_deg: f64,
}

/// Collects the controller output as opposed wheel demands.
#[derive(Default)]
struct SpinDemand {
    left: f64,
    right: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidSource for HeadingOffset {
    fn pid_get(&mut self) -> f64 {
        self.offset_deg / self.normalisation_deg
    }
}

impl PidOutput for SpinDemand {
    fn pid_write(&mut self, value: f64) {
        // Positive output turns clockwise
        self.left = value;
        self.right = -value;
    }
}

impl TurnSession {
    /// Turn `angle_deg` relative to the current heading.
    pub fn new(
        angle_deg: f64,
        timeout_s: f64,
        sensors: &Sensors,
        now_s: f64,
        reply_to: Option<String>,
        params: &Params,
    ) -> Self {
        let start_heading = wrap_deg_180(sensors.heading_deg);

        Self {
            target_deg: wrap_deg_180(start_heading + angle_deg),
            timeout_s,
            start_s: now_s,
            reply_to,
            pid: PidController::new(params.turn_k_p, params.turn_k_i, params.turn_k_d)
                .with_output_limit(params.turn_max_output),
        }
    }

    /// Shortest signed angle from the current heading to the target.
    pub fn heading_error_deg(&self, sensors: &Sensors) -> f64 {
        wrap_deg_180(self.target_deg - sensors.heading_deg)
    }

    pub fn on_target(&self, sensors: &Sensors, params: &Params) -> bool {
        self.heading_error_deg(sensors).abs() < params.turn_tolerance_deg
            && sensors.rate_deg_s.abs() < params.turn_rate_tolerance_deg_s
    }

    pub fn step(&mut self, sensors: &Sensors, now_s: f64, params: &Params) -> Step {
        if self.on_target(sensors, params) {
            return Step::Done(Response::Ok);
        }

        if now_s - self.start_s >= self.timeout_s {
            return Step::Done(Response::Error);
        }

        let mut source = HeadingOffset {
            offset_deg: -self.heading_error_deg(sensors),
            normalisation_deg: params.turn_normalisation_deg,
        };
        let mut demand = SpinDemand::default();
        self.pid.step(&mut source, &mut demand, now_s);

        Step::Drive(demand.left, demand.right)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
