//! # Hanger
//!
//! The climbing hook. The first hang command drives the motor to pull the release pin, letting the
//! hook deploy. Once the hook has had time to reach the bar, every cycle carrying a hang command
//! winches the robot up, and any other cycle stops the winch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use std::sync::Arc;

use super::HangerParams;
use comms_if::{
    eqpt::MotorOutput,
    msg::{Command, Message, RobotState},
    tm::Telemetry,
};
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct HangerHw {
    pub motor: Box<dyn MotorOutput>,
}

pub struct Hanger {
    params: HangerParams,
    hw: HangerHw,
    tm: Arc<dyn Telemetry>,

    enabled: bool,
    state: HangState,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HangState {
    NotDeployed,

    /// Pin pulled at the given time, waiting for the hook to settle on the bar
    DeployedAndWaiting(f64),

    Raising,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Hanger {
    pub fn new(params: HangerParams, mut hw: HangerHw, tm: Arc<dyn Telemetry>) -> Self {
        hw.motor.set_brake_mode(true);
        hw.motor.set(0.0);

        Self {
            params,
            hw,
            tm,
            enabled: false,
            state: HangState::NotDeployed,
        }
    }

    pub fn state(&self) -> HangState {
        self.state
    }

    /// Motor demand for this cycle.
    fn demand(&mut self, hang: bool, now_s: f64) -> f64 {
        match self.state {
            HangState::NotDeployed if hang => {
                info!("Pulling hanger pin");
                self.state = HangState::DeployedAndWaiting(now_s);
                self.params.pullout_speed
            }
            HangState::NotDeployed => 0.0,
            HangState::DeployedAndWaiting(start_s) => {
                let elapsed_s = now_s - start_s;
                if elapsed_s > self.params.air_time_s {
                    info!("Hanger ready to raise");
                    self.state = HangState::Raising;
                }

                match elapsed_s > self.params.pinout_s {
                    true => 0.0,
                    false => self.params.pullout_speed,
                }
            }
            HangState::Raising if hang => self.params.raise_speed,
            HangState::Raising => 0.0,
        }
    }
}

impl Component for Hanger {
    fn name(&self) -> &str {
        "Hanger"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        // Deployment cannot be undone, only the motor is stopped
        self.enabled = state.is_enabled();
        self.hw.motor.set(0.0);
    }

    fn run(&mut self, msg: &Message, now_s: f64) {
        let hang = match msg.command {
            Command::HangerHang => true,
            Command::SystemMsgTimeout | Command::Unknown => false,
            c => {
                if !c.is_state_change() {
                    debug!("Hanger ignoring {:?}", c);
                }
                false
            }
        };

        let demand = match self.enabled {
            true => self.demand(hang, now_s),
            false => 0.0,
        };
        self.hw.motor.set(demand);

        self.tm.put_string("Hanger State", &format!("{:?}", self.state));
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

    fn hanger(state: RobotState) -> (SimMotor, Hanger) {
        let plant = SimPlant::new(SimPlantParams::default());
        let motor = plant.add_motor();
        let mut hanger = Hanger::new(
            HangerParams::default(),
            HangerHw {
                motor: Box::new(motor.clone()),
            },
            Arc::new(NullTelemetry),
        );
        hanger.on_state_change(state, 0.0);
        (motor, hanger)
    }

    #[test]
    fn test_hang_sequence() {
        let (motor, mut hanger) = hanger(RobotState::Teleoperated);
        let hang = Message::bare(Command::HangerHang).unwrap();

        hanger.run(&Message::timeout(), 0.0);
        assert_eq!(hanger.state(), HangState::NotDeployed);
        assert_eq!(motor.demand(), 0.0);

        // Pin pulled for a short time only
        hanger.run(&hang, 1.0);
        assert_eq!(hanger.state(), HangState::DeployedAndWaiting(1.0));
        assert_eq!(motor.demand(), 1.0);
        hanger.run(&hang, 1.05);
        assert_eq!(motor.demand(), 1.0);
        hanger.run(&hang, 1.2);
        assert_eq!(motor.demand(), 0.0);

        hanger.run(&Message::timeout(), 2.6);
        assert_eq!(hanger.state(), HangState::Raising);

        // Winch runs only while commanded
        hanger.run(&hang, 2.7);
        assert_eq!(motor.demand(), 1.0);
        hanger.run(&Message::timeout(), 2.8);
        assert_eq!(motor.demand(), 0.0);
    }

    #[test]
    fn test_disabled_hanger_is_still() {
        let (motor, mut hanger) = hanger(RobotState::Disabled);
        hanger.run(&Message::bare(Command::HangerHang).unwrap(), 0.0);
        assert_eq!(hanger.state(), HangState::NotDeployed);
        assert_eq!(motor.demand(), 0.0);
    }
}
