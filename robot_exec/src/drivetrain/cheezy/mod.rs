//! # Cheezy drive loop
//!
//! The filter state and its Goal/Position/Output/Status block live behind a single mutex, shared
//! between the drivetrain and a background thread iterating the filter at a fixed rate. Every read
//! and write of the block takes the lock, so a reader never sees a new goal next to a stale
//! output.
//!
//! The drivetrain updates the block on every cycle whatever its drive mode, which keeps the
//! estimate and output warm for when cheezy drive is selected.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod filter;

pub use filter::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use thiserror::Error;

use util::time::Clock;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The block shared between the drivetrain and the filter thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheezyBlock {
    pub goal: CheezyGoal,
    pub position: CheezyPosition,
    pub output: CheezyOutput,
    pub status: CheezyStatus,

    /// Whether the drivetrain is applying the output to the motors.
    pub output_enabled: bool,
}

/// Handle to the shared filter, cheap to clone.
#[derive(Clone)]
pub struct CheezyLoop {
    shared: Arc<Mutex<Shared>>,
}

struct Shared {
    block: CheezyBlock,
    filter: CheezyFilter,
    last_iter_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CheezyError {
    #[error("The cheezy block lock is poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Shared {
    fn iterate(&mut self, now_s: f64) {
        let dt_s = match self.last_iter_s {
            Some(t) => now_s - t,
            None => 0.0,
        };

        // Time not moving means the other caller has already iterated this instant
        if self.last_iter_s.is_some() && dt_s <= 0.0 {
            return;
        }

        let (output, status) = self
            .filter
            .iterate(&self.block.goal, &self.block.position, dt_s);
        self.block.output = output;
        self.block.status = status;
        self.last_iter_s = Some(now_s);
    }
}

impl CheezyLoop {
    pub fn new(params: CheezyParams) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                block: CheezyBlock::default(),
                filter: CheezyFilter::new(params),
                last_iter_s: None,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>, CheezyError> {
        self.shared.lock().map_err(|_| CheezyError::Poisoned)
    }

    /// Write a new goal and position, iterate the filter and return the resulting output.
    pub fn update(
        &self,
        goal: CheezyGoal,
        position: CheezyPosition,
        output_enabled: bool,
        now_s: f64,
    ) -> Result<CheezyOutput, CheezyError> {
        let mut shared = self.lock()?;

        if shared.block.output_enabled != output_enabled {
            debug!("Cheezy output enabled: {}", output_enabled);
        }

        shared.block.goal = goal;
        shared.block.position = position;
        shared.block.output_enabled = output_enabled;
        shared.iterate(now_s);

        Ok(shared.block.output)
    }

    /// Iterate the filter on the goal and position already in the block.
    pub fn iterate(&self, now_s: f64) -> Result<(), CheezyError> {
        self.lock()?.iterate(now_s);
        Ok(())
    }

    /// A consistent copy of the whole block.
    pub fn snapshot(&self) -> Result<CheezyBlock, CheezyError> {
        Ok(self.lock()?.block)
    }

    /// Run the filter at its own period until `stop` is set.
    pub fn spawn(
        &self,
        clock: Arc<dyn Clock>,
        stop: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        let handle = self.clone();
        let period_s = match self.lock() {
            Ok(s) => s.filter.params().period_s,
            Err(_) => CheezyParams::default().period_s,
        };

        thread::Builder::new()
            .name("tCheezy".into())
            .spawn(move || {
                info!("Cheezy filter running at {:.0} Hz", 1.0 / period_s);

                while !stop.load(Ordering::Relaxed) {
                    if let Err(e) = handle.iterate(clock.now_s()) {
                        error!("Cheezy filter stopped: {}", e);
                        break;
                    }
                    clock.sleep(period_s);
                }
            })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use util::time::MonotonicClock;

    #[test]
    fn test_warm_state_carries_into_cheezy_mode() {
        let params = CheezyParams::default();
        let max_step_v = params.max_slew_v_s * 0.02;

        // Another mode has been contributing a half throttle goal
        let warm = CheezyLoop::new(params);
        let mut last = CheezyOutput::default();
        for i in 0..100 {
            let counts = 1400.0 * i as f64 * 0.02;
            let pos = CheezyPosition {
                left_counts: counts,
                right_counts: counts,
                ..CheezyPosition::default()
            };
            let goal = CheezyGoal {
                wheel: 0.0,
                throttle: 0.5,
                quickturn: false,
            };
            last = warm.update(goal, pos, false, i as f64 * 0.02).unwrap();
        }

        // Switch into cheezy drive with the same stick position
        let goal = CheezyGoal {
            wheel: 0.0,
            throttle: 0.5,
            quickturn: false,
        };
        let first = warm
            .update(goal, CheezyPosition::default(), true, 100.0 * 0.02)
            .unwrap();

        assert!((first.left_voltage - last.left_voltage).abs() <= max_step_v + 1e-9);
        assert!((first.left_voltage - 6.0).abs() < 1e-6);

        // A filter which was never fed starts from zero
        let cold = CheezyLoop::new(params);
        cold.update(goal, CheezyPosition::default(), true, 0.0)
            .unwrap();
        let cold_first = cold
            .update(goal, CheezyPosition::default(), true, 0.02)
            .unwrap();
        assert!(cold_first.left_voltage <= max_step_v + 1e-9);
        assert!(first.left_voltage - cold_first.left_voltage > 3.0);

        assert!(warm.snapshot().unwrap().output_enabled);
    }

    #[test]
    fn test_same_instant_iterates_once() {
        let cheezy = CheezyLoop::new(CheezyParams::default());
        let goal = CheezyGoal::default();
        let pos = CheezyPosition::default();

        cheezy.update(goal, pos, false, 1.0).unwrap();
        cheezy.update(goal, pos, false, 1.0).unwrap();
        cheezy.iterate(1.0).unwrap();
        assert_eq!(cheezy.snapshot().unwrap().status.num_iterations, 1);

        cheezy.iterate(1.005).unwrap();
        assert_eq!(cheezy.snapshot().unwrap().status.num_iterations, 2);
    }

    #[test]
    fn test_background_thread() {
        let cheezy = CheezyLoop::new(CheezyParams::default());
        let stop = Arc::new(AtomicBool::new(false));

        let jh = cheezy
            .spawn(Arc::new(MonotonicClock::new()), stop.clone())
            .unwrap();
        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        jh.join().unwrap();

        assert!(cheezy.snapshot().unwrap().status.num_iterations > 5);
    }
}
