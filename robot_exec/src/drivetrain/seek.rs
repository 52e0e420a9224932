//! Seeking behaviours: vision servoing onto a target and range sensor homing.
//!
//! Both drive one side of the robot at a time, swapping sides every window, which gives a
//! rocking approach rather than a pivot about the centre.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::Response;

use super::{Params, Sensors, Step};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Which camera a search servos on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Goal,
    Ball,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeekSession {
    pub target: SeekTarget,

    /// Units: seconds
    pub timeout_s: f64,

    pub start_s: f64,

    /// When the target was first seen inside the dead band, if it still is
    pub centred_since_s: Option<f64>,

    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSession {
    pub speed: f64,

    /// Units: seconds
    pub timeout_s: f64,

    pub start_s: f64,

    pub reply_to: Option<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SeekSession {
    pub fn new(target: SeekTarget, timeout_s: f64, now_s: f64, reply_to: Option<String>) -> Self {
        Self {
            target,
            timeout_s,
            start_s: now_s,
            centred_since_s: None,
            reply_to,
        }
    }

    pub fn step(&mut self, sensors: &Sensors, now_s: f64, params: &Params) -> Step {
        if now_s - self.start_s >= self.timeout_s {
            return Step::Done(Response::Error);
        }

        let offset = match self.target {
            SeekTarget::Goal => sensors.goal_offset,
            SeekTarget::Ball => sensors.ball_offset,
        };

        let offset = match offset {
            Some(o) => o,
            None => {
                // Nothing in view, hold still and wait
                self.centred_since_s = None;
                return Step::Drive(0.0, 0.0);
            }
        };

        if offset.abs() <= params.search_dead_band {
            let since = *self.centred_since_s.get_or_insert(now_s);
            if now_s - since >= params.search_settle_s {
                return Step::Done(Response::Ok);
            }
            return Step::Drive(0.0, 0.0);
        }

        self.centred_since_s = None;

        // Cube root gives fine control near the centre and a strong push far from it
        let power = offset.signum() * params.search_gain * offset.abs().cbrt();

        if window(now_s - self.start_s, params.search_window_s) == 0 {
            Step::Drive(power, 0.0)
        } else {
            Step::Drive(0.0, -power)
        }
    }
}

impl RangeSession {
    pub fn new(speed: f64, timeout_s: f64, now_s: f64, reply_to: Option<String>) -> Self {
        Self {
            speed,
            timeout_s,
            start_s: now_s,
            reply_to,
        }
    }

    pub fn step(&self, sensors: &Sensors, now_s: f64, params: &Params) -> Step {
        if sensors.range_triggered {
            return Step::Done(Response::Ok);
        }

        if now_s - self.start_s >= self.timeout_s {
            return Step::Done(Response::Error);
        }

        if window(now_s - self.start_s, params.range_window_s) == 0 {
            Step::Drive(self.speed, 0.0)
        } else {
            Step::Drive(0.0, self.speed)
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Parity of the window the elapsed time falls in.
fn window(elapsed_s: f64, window_s: f64) -> u64 {
    if window_s <= 0.0 {
        return 0;
    }
    ((elapsed_s / window_s).floor().max(0.0) as u64) % 2
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimBearingCamera, SimPlant, SimPlantParams};
    use comms_if::eqpt::{AngleSensor, MotorOutput, OffsetSensor};

    #[test]
    fn test_search_alternates_sides() {
        let params = Params::default();
        let mut session = SeekSession::new(SeekTarget::Goal, 5.0, 0.0, None);
        let sensors = Sensors {
            goal_offset: Some(0.125),
            ..Sensors::default()
        };

        match session.step(&sensors, 0.1, &params) {
            Step::Drive(l, r) => {
                assert!((l - 0.15).abs() < 1e-9);
                assert_eq!(r, 0.0);
            }
            s => panic!("unexpected {:?}", s),
        }
        match session.step(&sensors, 0.6, &params) {
            Step::Drive(l, r) => {
                assert_eq!(l, 0.0);
                assert!((r + 0.15).abs() < 1e-9);
            }
            s => panic!("unexpected {:?}", s),
        }

        // Only the ball camera matters to a ball search
        let mut ball = SeekSession::new(SeekTarget::Ball, 5.0, 0.0, None);
        assert_eq!(ball.step(&sensors, 0.1, &params), Step::Drive(0.0, 0.0));
    }

    #[test]
    fn test_search_settles_on_target() {
        let params = Params::default();
        let plant = SimPlant::new(SimPlantParams::default());
        let (mut left, mut right) = plant.drive_motors();
        let gyro = plant.gyro();
        let camera = SimBearingCamera::new(plant.gyro(), 30.0, 40.0);

        let mut session = SeekSession::new(SeekTarget::Goal, 5.0, 0.0, None);
        let mut now_s = 0.0;

        let rsp = loop {
            let sensors = Sensors {
                goal_offset: camera.try_get_offset(),
                ..Sensors::default()
            };
            match session.step(&sensors, now_s, &params) {
                Step::Drive(l, r) => {
                    left.set(l);
                    right.set(r);
                }
                Step::Done(rsp) => break rsp,
            }
            plant.step(0.02);
            now_s += 0.02;
        };

        assert_eq!(rsp, Response::Ok);
        assert!(now_s < 5.0);
        assert!((gyro.heading_deg() - 30.0).abs() <= 40.0 * params.search_dead_band);
    }

    #[test]
    fn test_search_times_out_without_target() {
        let params = Params::default();
        let mut session = SeekSession::new(SeekTarget::Ball, 2.0, 1.0, None);
        let sensors = Sensors::default();

        assert_eq!(session.step(&sensors, 2.9, &params), Step::Drive(0.0, 0.0));
        assert_eq!(
            session.step(&sensors, 3.0, &params),
            Step::Done(Response::Error)
        );
    }

    #[test]
    fn test_range_sense() {
        let params = Params::default();
        let session = RangeSession::new(0.4, 3.0, 0.0, None);
        let mut sensors = Sensors::default();

        assert_eq!(session.step(&sensors, 0.2, &params), Step::Drive(0.4, 0.0));
        assert_eq!(session.step(&sensors, 0.7, &params), Step::Drive(0.0, 0.4));
        assert_eq!(session.step(&sensors, 1.2, &params), Step::Drive(0.4, 0.0));

        sensors.range_triggered = true;
        assert_eq!(session.step(&sensors, 1.3, &params), Step::Done(Response::Ok));

        sensors.range_triggered = false;
        assert_eq!(
            session.step(&sensors, 3.0, &params),
            Step::Done(Response::Error)
        );
    }
}
