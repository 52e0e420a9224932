//! # Motor current guard
//!
//! Protects a single motor from a sustained over-current. If the supply current stays above the
//! limit for longer than the grace period the motor is disabled until the guard is reset, which
//! happens on every robot state change.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::error;
use serde::Deserialize;

// Internal
use comms_if::eqpt::MotorOutput;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Limits for one guard.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CurrentLimit {
    /// Units: amps
    pub max_current_a: f64,

    /// How long the current may stay above the limit.
    ///
    /// Units: seconds
    pub max_time_s: f64,
}

#[derive(Debug, Clone)]
pub struct CurrentGuard {
    name: String,
    limit: CurrentLimit,
    over_since_s: Option<f64>,
    tripped: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CurrentGuard {
    pub fn new(name: &str, limit: CurrentLimit) -> Self {
        Self {
            name: name.to_string(),
            limit,
            over_since_s: None,
            tripped: false,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Clear the trip and re-enable the motor.
    pub fn reset<M: MotorOutput + ?Sized>(&mut self, motor: &mut M) {
        self.over_since_s = None;
        self.tripped = false;
        motor.enable();
    }

    /// Check the motor's current, disabling it if the guard trips.
    ///
    /// Returns true if the motor is (now or already) disabled by this guard.
    pub fn police<M: MotorOutput + ?Sized>(&mut self, motor: &mut M, now_s: f64) -> bool {
        if self.tripped {
            return true;
        }

        if motor.supply_current().abs() <= self.limit.max_current_a {
            self.over_since_s = None;
            return false;
        }

        let since = *self.over_since_s.get_or_insert(now_s);

        if now_s - since >= self.limit.max_time_s {
            error!(
                "{} current above {:.1} A for {:.2} s, motor disabled",
                self.name,
                self.limit.max_current_a,
                now_s - since
            );
            motor.set(0.0);
            motor.disable();
            self.tripped = true;
        }

        self.tripped
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
