//! Straight driving with gyro heading correction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::msg::Response;
use util::maths::{abs_limit, clamp};

use super::{Params, Sensors, Step};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An active straight drive, either distance or time bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightSession {
    /// Signed speed demand, negative drives backwards
    pub speed: f64,

    /// Distance to travel, `None` for a time bounded drive.
    ///
    /// Units: counts
    pub target_counts: Option<f64>,

    /// Units: seconds
    pub timeout_s: f64,

    pub start_s: f64,

    /// Heading held during the drive
    pub baseline_heading_deg: f64,

    pub baseline_left: f64,
    pub baseline_right: f64,

    pub reply_to: Option<String>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StraightSession {
    /// Drive `distance_in` inches, giving up after `timeout_s`.
    pub fn measured(
        speed: f64,
        distance_in: f64,
        timeout_s: f64,
        sensors: &Sensors,
        now_s: f64,
        reply_to: Option<String>,
        params: &Params,
    ) -> Self {
        Self {
            target_counts: Some(params.inches_to_counts(distance_in.abs())),
            ..Self::timed(speed, timeout_s, sensors, now_s, reply_to)
        }
    }

    /// Drive for `duration_s`.
    pub fn timed(
        speed: f64,
        duration_s: f64,
        sensors: &Sensors,
        now_s: f64,
        reply_to: Option<String>,
    ) -> Self {
        Self {
            speed,
            target_counts: None,
            timeout_s: duration_s,
            start_s: now_s,
            baseline_heading_deg: sensors.heading_deg,
            baseline_left: sensors.left_counts,
            baseline_right: sensors.right_counts,
            reply_to,
        }
    }

    /// Average distance covered by the two sides since the drive started.
    ///
    /// Units: counts
    pub fn travelled_counts(&self, sensors: &Sensors) -> f64 {
        ((sensors.left_counts - self.baseline_left).abs()
            + (sensors.right_counts - self.baseline_right).abs())
            / 2.0
    }

    pub fn heading_error_deg(&self, sensors: &Sensors) -> f64 {
        sensors.heading_deg - self.baseline_heading_deg
    }

    pub fn step(&self, sensors: &Sensors, now_s: f64, params: &Params) -> Step {
        if let Some(target) = self.target_counts {
            if self.travelled_counts(sensors) >= target {
                return Step::Done(Response::Ok);
            }
        }

        if now_s - self.start_s >= self.timeout_s {
            return match self.target_counts {
                // Ran out of time before covering the distance
                Some(_) => Step::Done(Response::Error),
                None => Step::Done(Response::Ok),
            };
        }

        let (left, right) = heading_correction(self.speed, self.heading_error_deg(sensors), params);
        Step::Drive(left, right)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Left and right demands holding the heading while driving at `speed`.
///
/// A positive (clockwise) heading error slows the left side relative to the right. When reversing
/// the sides swap roles, otherwise the correction would add to the error.
pub fn heading_correction(speed: f64, heading_error_deg: f64, params: &Params) -> (f64, f64) {
    let correction = abs_limit(
        params.recover_strength * heading_error_deg,
        params.max_recover,
    );

    let (left, right) = if speed >= 0.0 {
        ((1.0 - correction) * speed, (1.0 + correction) * speed)
    } else {
        ((1.0 + correction) * speed, (1.0 - correction) * speed)
    };

    (clamp(left, -1.0, 1.0), clamp(right, -1.0, 1.0))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimPlant, SimPlantParams};
    use comms_if::eqpt::{AngleSensor, MotorOutput};

    /// Drive the plant with the correction alone and record the heading error each cycle.
    fn converge(speed: f64) -> Vec<f64> {
        let params = Params::default();
        let plant = SimPlant::new(SimPlantParams::default());
        let (mut left, mut right) = plant.drive_motors();
        let gyro = plant.gyro();

        // Start off course by 10 degrees
        gyro.set_heading(10.0);

        let mut errors = vec![gyro.heading_deg()];
        for _ in 0..50 {
            let (l, r) = heading_correction(speed, gyro.heading_deg(), &params);
            left.set(l);
            right.set(r);
            plant.step(0.02);
            errors.push(gyro.heading_deg());
        }
        errors
    }

    #[test]
    fn test_correction_converges_forwards() {
        let errors = converge(0.5);
        for w in errors.windows(2) {
            assert!(w[1].abs() <= w[0].abs() + 1e-9, "{:?}", w);
        }
        assert!(errors.last().unwrap().abs() < 0.1);
    }

    #[test]
    fn test_correction_converges_backwards() {
        let errors = converge(-0.5);
        for w in errors.windows(2) {
            assert!(w[1].abs() <= w[0].abs() + 1e-9, "{:?}", w);
        }
        assert!(errors.last().unwrap().abs() < 0.1);
    }

    #[test]
    fn test_correction_limits() {
        let params = Params::default();

        // Large errors saturate at the maximum recovery
        let (l, r) = heading_correction(0.5, 100.0, &params);
        assert!((l - 0.325).abs() < 1e-9);
        assert!((r - 0.675).abs() < 1e-9);

        // Outputs never exceed full power
        let (l, r) = heading_correction(1.0, -100.0, &params);
        assert_eq!(l, 1.0);
        assert!((r - 0.65).abs() < 1e-9);

        assert_eq!(heading_correction(-0.4, 0.0, &params), (-0.4, -0.4));
    }

    #[test]
    fn test_measured_termination() {
        let params = Params::default();
        let mut sensors = Sensors::default();
        let session =
            StraightSession::measured(0.5, 24.0, 5.0, &sensors, 0.0, None, &params);

        assert!(matches!(session.step(&sensors, 0.1, &params), Step::Drive(_, _)));

        sensors.left_counts = 1303.0;
        sensors.right_counts = 1303.0;
        assert!(matches!(session.step(&sensors, 0.2, &params), Step::Drive(_, _)));

        sensors.right_counts = 1305.0;
        assert_eq!(session.step(&sensors, 0.3, &params), Step::Done(Response::Ok));

        sensors.left_counts = 0.0;
        sensors.right_counts = 0.0;
        assert_eq!(
            session.step(&sensors, 5.0, &params),
            Step::Done(Response::Error)
        );
    }

    #[test]
    fn test_timed_termination() {
        let params = Params::default();
        let sensors = Sensors::default();
        let session = StraightSession::timed(-0.3, 1.5, &sensors, 2.0, None);

        assert!(matches!(session.step(&sensors, 3.0, &params), Step::Drive(_, _)));
        assert_eq!(session.step(&sensors, 3.5, &params), Step::Done(Response::Ok));
    }
}
