//! # Cheezy drive filter
//!
//! Curvature drive with wheel non-linearity, negative inertia and quick turn handling. Wheel
//! motion is tracked by an alpha-beta estimator fed from the encoders, and the voltage output is
//! slew rate limited so that it only ever moves continuously from its previous value.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use util::maths::abs_limit;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CheezyParams {
    /// Period of the background filter thread.
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Longest time step a single iteration integrates over.
    ///
    /// Units: seconds
    pub max_dt_s: f64,

    /// Voltage corresponding to a unit demand.
    ///
    /// Units: volts
    pub nominal_voltage_v: f64,

    /// Maximum rate of change of the output voltage.
    ///
    /// Units: volts/second
    pub max_slew_v_s: f64,

    pub wheel_nonlinearity: f64,
    pub sensitivity: f64,

    pub neg_inertia_threshold: f64,
    pub neg_inertia_turn_scalar: f64,
    pub neg_inertia_close_scalar: f64,
    pub neg_inertia_far_scalar: f64,

    /// Throttle below which quick turn builds up its stop accumulator.
    pub quickstop_dead_band: f64,
    pub quickstop_weight: f64,
    pub quickstop_scalar: f64,

    /// Estimator position gain.
    pub estimator_alpha: f64,

    /// Estimator velocity gain.
    pub estimator_beta: f64,
}

/// What the driver (or the active drive mode) is asking for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct CheezyGoal {
    pub wheel: f64,
    pub throttle: f64,
    pub quickturn: bool,
}

/// Latest sensor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheezyPosition {
    /// Units: counts
    pub left_counts: f64,

    /// Units: counts
    pub right_counts: f64,

    /// Units: degrees
    pub heading_deg: f64,

    /// Units: volts
    pub battery_v: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct CheezyOutput {
    /// Units: volts
    pub left_voltage: f64,

    /// Units: volts
    pub right_voltage: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct CheezyStatus {
    /// Units: counts/second
    pub est_left_velocity: f64,

    /// Units: counts/second
    pub est_right_velocity: f64,

    /// Units: degrees
    pub heading_deg: f64,

    /// True if the output was limited by the battery voltage on the last iteration.
    pub output_capped: bool,

    pub num_iterations: u64,
}

/// Internal state of the filter.
#[derive(Debug, Clone)]
pub struct CheezyFilter {
    params: CheezyParams,

    old_wheel: f64,
    neg_inertia_accumulator: f64,
    quickstop_accumulator: f64,

    left: Option<AlphaBeta>,
    right: Option<AlphaBeta>,

    output: CheezyOutput,
    num_iterations: u64,
}

/// Position/velocity tracker for one side of the drive.
#[derive(Debug, Clone, Copy)]
struct AlphaBeta {
    position: f64,
    velocity: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CheezyParams {
    fn default() -> Self {
        Self {
            period_s: 0.005,
            max_dt_s: 0.1,
            nominal_voltage_v: 12.0,
            max_slew_v_s: 60.0,
            wheel_nonlinearity: 0.5,
            sensitivity: 0.65,
            neg_inertia_threshold: 0.65,
            neg_inertia_turn_scalar: 4.0,
            neg_inertia_close_scalar: 5.0,
            neg_inertia_far_scalar: 3.0,
            quickstop_dead_band: 0.2,
            quickstop_weight: 0.1,
            quickstop_scalar: 5.0,
            estimator_alpha: 0.5,
            estimator_beta: 0.1,
        }
    }
}

impl Default for CheezyPosition {
    fn default() -> Self {
        Self {
            left_counts: 0.0,
            right_counts: 0.0,
            heading_deg: 0.0,
            battery_v: 12.0,
        }
    }
}

impl CheezyFilter {
    pub fn new(params: CheezyParams) -> Self {
        Self {
            params,
            old_wheel: 0.0,
            neg_inertia_accumulator: 0.0,
            quickstop_accumulator: 0.0,
            left: None,
            right: None,
            output: CheezyOutput::default(),
            num_iterations: 0,
        }
    }

    pub fn params(&self) -> &CheezyParams {
        &self.params
    }

    /// Advance the filter by `dt_s` seconds.
    pub fn iterate(
        &mut self,
        goal: &CheezyGoal,
        position: &CheezyPosition,
        dt_s: f64,
    ) -> (CheezyOutput, CheezyStatus) {
        let dt_s = dt_s.max(0.0).min(self.params.max_dt_s);

        // ---- ESTIMATOR ----

        let (alpha, beta) = (self.params.estimator_alpha, self.params.estimator_beta);
        let left = track(self.left, position.left_counts, dt_s, alpha, beta);
        let right = track(self.right, position.right_counts, dt_s, alpha, beta);
        self.left = Some(left);
        self.right = Some(right);

        // ---- CURVATURE DRIVE ----

        let (left_pwm, right_pwm) = self.curvature(goal);

        // ---- VOLTAGE OUTPUT ----

        let max_step_v = self.params.max_slew_v_s * dt_s;
        let battery_v = position.battery_v.abs();
        let mut capped = false;

        let mut slew = |last_v: f64, pwm: f64| -> f64 {
            let demand_v = pwm * self.params.nominal_voltage_v;
            let mut v = last_v + abs_limit(demand_v - last_v, max_step_v);
            if v.abs() > battery_v {
                v = abs_limit(v, battery_v);
                capped = true;
            }
            v
        };

        let output = CheezyOutput {
            left_voltage: slew(self.output.left_voltage, left_pwm),
            right_voltage: slew(self.output.right_voltage, right_pwm),
        };
        self.output = output;
        self.num_iterations += 1;

        let status = CheezyStatus {
            est_left_velocity: left.velocity,
            est_right_velocity: right.velocity,
            heading_deg: position.heading_deg,
            output_capped: capped,
            num_iterations: self.num_iterations,
        };

        (output, status)
    }

    /// Left and right demands in [-1, 1] for the goal.
    fn curvature(&mut self, goal: &CheezyGoal) -> (f64, f64) {
        let p = self.params;
        let throttle = abs_limit(goal.throttle, 1.0);
        let mut wheel = abs_limit(goal.wheel, 1.0);

        let neg_inertia = wheel - self.old_wheel;
        self.old_wheel = wheel;

        // Apply the sine non-linearity twice to flatten the response near centre
        let denom = (FRAC_PI_2 * p.wheel_nonlinearity).sin();
        for _ in 0..2 {
            wheel = (FRAC_PI_2 * p.wheel_nonlinearity * wheel).sin() / denom;
        }

        // Negative inertia
        let neg_inertia_scalar = if wheel * neg_inertia > 0.0 {
            p.neg_inertia_turn_scalar
        } else if wheel.abs() > p.neg_inertia_threshold {
            p.neg_inertia_far_scalar
        } else {
            p.neg_inertia_close_scalar
        };
        self.neg_inertia_accumulator += neg_inertia * neg_inertia_scalar;
        wheel += self.neg_inertia_accumulator;
        self.neg_inertia_accumulator = decay(self.neg_inertia_accumulator);

        // Quick turn
        let over_power;
        let angular_power;
        if goal.quickturn {
            if throttle.abs() < p.quickstop_dead_band {
                self.quickstop_accumulator = (1.0 - p.quickstop_weight)
                    * self.quickstop_accumulator
                    + p.quickstop_weight * abs_limit(wheel, 1.0) * p.quickstop_scalar;
            }
            over_power = 1.0;
            angular_power = wheel;
        } else {
            over_power = 0.0;
            angular_power = throttle.abs() * wheel * p.sensitivity - self.quickstop_accumulator;
            self.quickstop_accumulator = decay(self.quickstop_accumulator);
        }

        let mut left = throttle + angular_power;
        let mut right = throttle - angular_power;

        // Push any saturation onto the other side when quick turning
        if left > 1.0 {
            right -= over_power * (left - 1.0);
            left = 1.0;
        } else if right > 1.0 {
            left -= over_power * (right - 1.0);
            right = 1.0;
        } else if left < -1.0 {
            right += over_power * (-1.0 - left);
            left = -1.0;
        } else if right < -1.0 {
            left += over_power * (-1.0 - right);
            right = -1.0;
        }

        (abs_limit(left, 1.0), abs_limit(right, 1.0))
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn track(prev: Option<AlphaBeta>, measured: f64, dt_s: f64, alpha: f64, beta: f64) -> AlphaBeta {
    match prev {
        Some(ab) if dt_s > 0.0 => {
            let predicted = ab.position + ab.velocity * dt_s;
            let residual = measured - predicted;
            AlphaBeta {
                position: predicted + alpha * residual,
                velocity: ab.velocity + beta * residual / dt_s,
            }
        }
        Some(ab) => ab,
        None => AlphaBeta {
            position: measured,
            velocity: 0.0,
        },
    }
}

/// Move an accumulator one unit towards zero, snapping to zero inside the unit band.
fn decay(acc: f64) -> f64 {
    if acc > 1.0 {
        acc - 1.0
    } else if acc < -1.0 {
        acc + 1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn forward(throttle: f64) -> CheezyGoal {
        CheezyGoal {
            wheel: 0.0,
            throttle,
            quickturn: false,
        }
    }

    #[test]
    fn test_slew_limited_output() {
        let mut filter = CheezyFilter::new(CheezyParams::default());
        let pos = CheezyPosition::default();

        // 60 V/s over 0.02 s is 1.2 V per step
        let (out, _) = filter.iterate(&forward(1.0), &pos, 0.02);
        assert!((out.left_voltage - 1.2).abs() < 1e-9);
        assert!((out.right_voltage - 1.2).abs() < 1e-9);

        for _ in 0..20 {
            filter.iterate(&forward(1.0), &pos, 0.02);
        }
        let (out, status) = filter.iterate(&forward(1.0), &pos, 0.02);
        assert!((out.left_voltage - 12.0).abs() < 1e-9);
        assert_eq!(status.num_iterations, 22);
        assert!(!status.output_capped);
    }

    #[test]
    fn test_battery_cap() {
        let mut filter = CheezyFilter::new(CheezyParams::default());
        let pos = CheezyPosition {
            battery_v: 10.0,
            ..CheezyPosition::default()
        };

        let mut last = (CheezyOutput::default(), CheezyStatus::default());
        for _ in 0..50 {
            last = filter.iterate(&forward(-1.0), &pos, 0.02);
        }
        assert_eq!(last.0.left_voltage, -10.0);
        assert!(last.1.output_capped);
    }

    #[test]
    fn test_turning_splits_sides() {
        let mut filter = CheezyFilter::new(CheezyParams::default());
        let pos = CheezyPosition::default();
        let goal = CheezyGoal {
            wheel: 0.5,
            throttle: 0.5,
            quickturn: false,
        };

        let mut out = CheezyOutput::default();
        for _ in 0..100 {
            out = filter.iterate(&goal, &pos, 0.02).0;
        }
        assert!(out.left_voltage > out.right_voltage);
        assert!(out.left_voltage > 0.0);

        // Quick turn spins in place
        let goal = CheezyGoal {
            wheel: -1.0,
            throttle: 0.0,
            quickturn: true,
        };
        for _ in 0..100 {
            out = filter.iterate(&goal, &pos, 0.02).0;
        }
        assert!(out.left_voltage < 0.0);
        assert!(out.right_voltage > 0.0);
    }

    #[test]
    fn test_estimator_tracks_velocity() {
        let mut filter = CheezyFilter::new(CheezyParams::default());

        let mut status = CheezyStatus::default();
        for i in 0..300 {
            let counts = 1000.0 * i as f64 * 0.01;
            let pos = CheezyPosition {
                left_counts: counts,
                right_counts: -counts,
                ..CheezyPosition::default()
            };
            status = filter.iterate(&forward(0.0), &pos, 0.01).1;
        }

        assert!((status.est_left_velocity - 1000.0).abs() < 1.0);
        assert!((status.est_right_velocity + 1000.0).abs() < 1.0);
    }
}
