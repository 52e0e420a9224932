//! General time utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Real time a [`ManualClock`] sleeper yields for, regardless of the requested duration.
const MANUAL_SLEEP_YIELD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of monotonic time shared between the subsystem threads.
pub trait Clock: Send + Sync {
    /// Seconds since the clock's epoch.
    fn now_s(&self) -> f64;

    /// Block the calling thread for the given number of seconds.
    fn sleep(&self, dur_s: f64) {
        if dur_s > 0.0 {
            thread::sleep(Duration::from_secs_f64(dur_s));
        }
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wall clock time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

/// A clock which only moves when told to.
///
/// Used to drive subsystems deterministically in simulation. Sleeping on a manual clock does not
/// advance it, the caller just yields briefly so whoever owns the clock can step it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_s: Mutex<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl ManualClock {
    pub fn new(start_s: f64) -> Self {
        Self {
            now_s: Mutex::new(start_s),
        }
    }

    /// Move the clock forward, returning the new time.
    pub fn advance(&self, dt_s: f64) -> f64 {
        match self.now_s.lock() {
            Ok(mut t) => {
                *t += dt_s.max(0.0);
                *t
            }
            Err(p) => *p.into_inner(),
        }
    }
}

impl Clock for ManualClock {
    fn now_s(&self) -> f64 {
        match self.now_s.lock() {
            Ok(t) => *t,
            Err(p) => *p.into_inner(),
        }
    }

    fn sleep(&self, dur_s: f64) {
        if dur_s > 0.0 {
            thread::sleep(MANUAL_SLEEP_YIELD);
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_monotonic_clock() {
        let clock = MonotonicClock::new();
        let t0 = clock.now_s();
        clock.sleep(0.01);
        assert!(clock.now_s() - t0 >= 0.01);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(2.0);
        clock.sleep(10.0);
        assert_eq!(clock.now_s(), 2.0);
        assert_eq!(clock.advance(0.5), 2.5);
        assert_eq!(clock.advance(-1.0), 2.5);
        assert_eq!(clock.now_s(), 2.5);
    }
}
