//! # Tail
//!
//! A single motor raising or lowering the tail. Operator commands arrive every cycle while the
//! button is held so each only holds the motor for a moment, while a single autonomous command
//! runs it for longer. Otherwise the tail is held at its idle power.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use std::sync::Arc;

use super::TailParams;
use comms_if::{
    eqpt::MotorOutput,
    msg::{Command, Message, RobotState},
    tm::Telemetry,
};
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Tail {
    params: TailParams,
    motor: Box<dyn MotorOutput>,
    tm: Arc<dyn Telemetry>,

    state: RobotState,

    /// Current motion and the time it ends
    motion: Option<(Motion, f64)>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Raise,
    Lower,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tail {
    pub fn new(
        params: TailParams,
        mut motor: Box<dyn MotorOutput>,
        tm: Arc<dyn Telemetry>,
    ) -> Self {
        motor.set_brake_mode(true);
        motor.set(0.0);

        Self {
            params,
            motor,
            tm,
            state: RobotState::Unknown,
            motion: None,
        }
    }

    pub fn motion(&self) -> Option<Motion> {
        self.motion.map(|(m, _)| m)
    }

    fn start(&mut self, motion: Motion, now_s: f64) {
        let hold_s = match self.state {
            RobotState::Autonomous => self.params.auto_motor_s,
            _ => self.params.hold_s,
        };
        self.motion = Some((motion, now_s + hold_s));
    }
}

impl Component for Tail {
    fn name(&self) -> &str {
        "Tail"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        self.state = state;
        self.motion = None;
        self.motor.set(0.0);
    }

    fn run(&mut self, msg: &Message, now_s: f64) {
        match msg.command {
            Command::TailRaise => self.start(Motion::Raise, now_s),
            Command::TailLower => self.start(Motion::Lower, now_s),
            Command::AutonomousComplete => self.motion = None,
            Command::SystemMsgTimeout | Command::Unknown => (),
            c if c.is_state_change() => (),
            c => debug!("Tail ignoring {:?}", c),
        }

        if let Some((_, end_s)) = self.motion {
            if now_s >= end_s {
                self.motion = None;
            }
        }

        let demand = match (self.state.is_enabled(), self.motion()) {
            (false, _) => 0.0,
            (true, Some(Motion::Raise)) => self.params.raise_power,
            (true, Some(Motion::Lower)) => -self.params.lower_power,
            (true, None) => self.params.idle_power,
        };
        self.motor.set(demand);

        self.tm.put_number("Tail Power", demand);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimMotor, SimPlant, SimPlantParams};
    use comms_if::tm::NullTelemetry;

    fn tail(state: RobotState) -> (SimMotor, Tail) {
        let plant = SimPlant::new(SimPlantParams::default());
        let motor = plant.add_motor();
        let mut tail = Tail::new(
            TailParams::default(),
            Box::new(motor.clone()),
            Arc::new(NullTelemetry),
        );
        tail.on_state_change(state, 0.0);
        (motor, tail)
    }

    #[test]
    fn test_teleop_hold() {
        let (motor, mut tail) = tail(RobotState::Teleoperated);
        let raise = Message::bare(Command::TailRaise).unwrap();

        tail.run(&raise, 0.0);
        assert_eq!(motor.demand(), 0.5);
        tail.run(&raise, 0.02);
        assert_eq!(motor.demand(), 0.5);

        // Released
        tail.run(&Message::timeout(), 0.2);
        assert_eq!(tail.motion(), None);
        assert_eq!(motor.demand(), 0.0);
    }

    #[test]
    fn test_autonomous_motion() {
        let (motor, mut tail) = tail(RobotState::Autonomous);

        tail.run(&Message::bare(Command::TailLower).unwrap(), 0.0);
        tail.run(&Message::timeout(), 1.5);
        assert_eq!(motor.demand(), -0.5);
        tail.run(&Message::timeout(), 2.1);
        assert_eq!(motor.demand(), 0.0);

        tail.run(&Message::bare(Command::TailRaise).unwrap(), 3.0);
        tail.on_state_change(RobotState::Disabled, 3.1);
        tail.run(&Message::timeout(), 3.2);
        assert_eq!(tail.motion(), None);
        assert_eq!(motor.demand(), 0.0);
    }
}
