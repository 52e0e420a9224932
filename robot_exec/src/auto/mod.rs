//! # Autonomous
//!
//! The autonomous subsystem is split in two. [`Autonomous`] is an ordinary component which
//! receives the robot state changes and maps them onto the [`SeqControl`] flags, while the
//! [`Sequencer`] runs the script on its own thread and blocks on round trips to the other
//! subsystems through its dedicated reply channel.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod sequencer;
pub mod token;

pub use params::Params;
pub use sequencer::{SeqControl, SeqError, SeqState, Sequencer};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use std::sync::Arc;

use comms_if::{
    msg::{Message, RobotState},
    tm::Telemetry,
};
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Autonomous {
    control: SeqControl,
    tm: Arc<dyn Telemetry>,
    last_state: Option<SeqState>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Autonomous {
    pub fn new(control: SeqControl, tm: Arc<dyn Telemetry>) -> Self {
        Self {
            control,
            tm,
            last_state: None,
        }
    }
}

impl Component for Autonomous {
    fn name(&self) -> &str {
        "Autonomous"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        match state {
            RobotState::Autonomous => {
                info!("Starting autonomous script");
                self.control.enter_auto();
            }
            _ => self.control.leave_auto(),
        }
    }

    fn run(&mut self, msg: &Message, _now_s: f64) {
        if !msg.command.is_state_change() {
            debug!("Autonomous ignoring {:?}", msg.command);
        }

        let state = self.control.state();
        if self.last_state != Some(state) {
            info!("Sequencer {:?}", state);
            self.tm.put_string("Auto State", &format!("{:?}", state));
            self.last_state = Some(state);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tm::NullTelemetry;

    #[test]
    fn test_state_changes_drive_control() {
        let control = SeqControl::new();
        let mut auto = Autonomous::new(control.clone(), Arc::new(NullTelemetry));
        assert!(control.is_paused());

        auto.on_state_change(RobotState::Autonomous, 0.0);
        assert!(!control.is_paused());
        assert_eq!(control.generation(), 1);

        // The dispatcher reports the same entry, which must not restart the run
        control.enter_auto();
        assert_eq!(control.generation(), 1);

        control.set_state(SeqState::Running);
        auto.on_state_change(RobotState::Teleoperated, 1.0);
        assert!(control.is_paused());
        assert_eq!(control.state(), SeqState::Paused);

        // Every entry is a new run
        auto.on_state_change(RobotState::Autonomous, 2.0);
        assert_eq!(control.generation(), 2);
        assert!(!control.is_paused());
    }
}
