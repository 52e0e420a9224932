//! # PID controller
//!
//! A generic PID controller which knows nothing about the hardware it controls. The process value
//! is read through a [`PidSource`] and the controller output is written through a [`PidOutput`],
//! so the same controller drives the arm lever from an encoder and the drivetrain turn from the
//! gyro.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths::abs_limit;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Where the controller reads its process value from.
pub trait PidSource {
    fn pid_get(&mut self) -> f64;
}

/// Where the controller writes its output to.
pub trait PidOutput {
    fn pid_write(&mut self, value: f64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Time the error was last passed in
    prev_time_s: Option<f64>,

    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Target process value
    setpoint: f64,

    /// Symmetric limit applied to the output
    output_limit: Option<f64>,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            setpoint: 0f64,
            output_limit: None,
            integral: 0f64,
            prev_time_s: None,
            prev_error: None,
        }
    }

    /// Limit the output to `[-limit, limit]`.
    pub fn with_output_limit(mut self, limit: f64) -> Self {
        self.output_limit = Some(limit.abs());
        self
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// The error passed in on the last call, if any.
    pub fn last_error(&self) -> Option<f64> {
        self.prev_error
    }

    /// Forget the integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_time_s = None;
        self.prev_error = None;
    }

    /// Get the value of the controller for the given error at time `now_s`.
    pub fn get(&mut self, error: f64, now_s: f64) -> f64 {
        // Calculate dt, a non-increasing time is treated as no time difference
        let dt = match self.prev_time_s {
            Some(t0) if now_s > t0 => Some(now_s - t0),
            _ => None,
        };

        // Accumulate the integral term.
        //
        // If there's no time difference then we don't accumulate the integral, adding the raw
        // error would produce a large spike compared to normal operation.
        self.integral += match dt {
            Some(t) => error * t,
            None => 0f64,
        };

        // Calculate the derivative, again assuming none without a time difference
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64,
        };

        let mut out = self.k_p * error + self.k_i * self.integral + self.k_d * deriv;

        if let Some(limit) = self.output_limit {
            out = abs_limit(out, limit);
        }

        // Remember the previous error and time
        self.prev_error = Some(error);
        self.prev_time_s = Some(now_s);

        out
    }

    /// Read the process value from `source`, calculate the output and write it to `output`.
    ///
    /// Returns the value written.
    pub fn step<S, O>(&mut self, source: &mut S, output: &mut O, now_s: f64) -> f64
    where
        S: PidSource + ?Sized,
        O: PidOutput + ?Sized,
    {
        let error = self.setpoint - source.pid_get();
        let out = self.get(error, now_s);
        output.pid_write(out);
        out
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    struct Fixed(f64);

    impl PidSource for Fixed {
        fn pid_get(&mut self) -> f64 {
            self.0
        }
    }

    #[derive(Default)]
    struct Capture(Vec<f64>);

    impl PidOutput for Capture {
        fn pid_write(&mut self, value: f64) {
            self.0.push(value)
        }
    }

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);
        assert_eq!(pid.get(0.25, 0.0), 0.5);
        assert_eq!(pid.get(-1.0, 0.1), -2.0);
        assert_eq!(pid.last_error(), Some(-1.0));
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);
        // First call has no dt so nothing accumulates
        assert_eq!(pid.get(1.0, 0.0), 0.0);
        assert!((pid.get(1.0, 0.5) - 0.5).abs() < 1e-12);
        assert!((pid.get(1.0, 1.0) - 1.0).abs() < 1e-12);

        let mut pid = PidController::new(0.0, 0.0, 1.0);
        assert_eq!(pid.get(1.0, 0.0), 0.0);
        assert!((pid.get(0.5, 0.5) - (-1.0)).abs() < 1e-12);

        // Repeated timestamps don't divide by zero
        assert_eq!(pid.get(0.2, 0.5), 0.0);

        pid.reset();
        assert_eq!(pid.last_error(), None);
    }

    #[test]
    fn test_step_with_limit() {
        let mut pid = PidController::new(1.0, 0.0, 0.0).with_output_limit(0.5);
        pid.set_setpoint(10.0);

        let mut out = Capture::default();
        let first = pid.step(&mut Fixed(9.8), &mut out, 0.0);
        assert!((first - 0.2).abs() < 1e-9);
        pid.step(&mut Fixed(0.0), &mut out, 0.1);
        pid.step(&mut Fixed(20.0), &mut out, 0.2);

        assert_eq!(out.0.len(), 3);
        assert!((out.0[0] - 0.2).abs() < 1e-9);
        assert_eq!(out.0[1], 0.5);
        assert_eq!(out.0[2], -0.5);
    }
}
