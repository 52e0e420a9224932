//! # Arm
//!
//! The arm is a lever driven to preset positions by a PID controller, with a set of intake rollers
//! on its end. Lever commands only move the setpoint, the controller runs every cycle while the
//! robot is in autonomous or teleop.
//!
//! Autonomous actions (intake, throw-up, aim) run over several cycles and answer their caller once
//! finished.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::Arc;

// Internal
use super::{reply, ArmParams};
use crate::current_guard::CurrentGuard;
use crate::pid::{PidController, PidOutput, PidSource};
use comms_if::{
    chan::ChannelHub,
    eqpt::MotorOutput,
    msg::{Command, Message, Response, RobotState},
    tm::Telemetry,
};
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ArmHw {
    pub lever: Box<dyn MotorOutput>,
    pub rollers: Box<dyn MotorOutput>,
}

pub struct Arm {
    params: ArmParams,
    hw: ArmHw,
    hub: Arc<ChannelHub>,
    tm: Arc<dyn Telemetry>,

    pid: PidController,
    pid_enabled: bool,
    lever_guard: CurrentGuard,

    rollers: Rollers,
    action: Option<ArmAction>,
    clear_requested: bool,
}

/// A multi-cycle autonomous action.
#[derive(Debug, Clone, PartialEq)]
struct ArmAction {
    kind: ActionKind,
    end_s: f64,
    reply_to: Option<String>,
}

/// Position snapshot of the lever fed to the controller.
struct LeverPosition(f64);

/// The lever motor as the controller's output.
struct LeverPower<'a>(&'a mut dyn MotorOutput);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollers {
    In,
    Out,
    Idle,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    /// Run the rollers in until a ball is felt, failing at the deadline
    Intake,

    /// Run the rollers out for a fixed time
    Throwup,

    /// Give the lever a fixed time to reach the far position
    Aim,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidSource for LeverPosition {
    fn pid_get(&mut self) -> f64 {
        self.0
    }
}

impl<'a> PidOutput for LeverPower<'a> {
    fn pid_write(&mut self, value: f64) {
        self.0.set(value)
    }
}

impl Arm {
    pub fn new(
        params: ArmParams,
        mut hw: ArmHw,
        hub: Arc<ChannelHub>,
        tm: Arc<dyn Telemetry>,
    ) -> Self {
        hw.lever.set_brake_mode(true);
        hw.rollers.set_brake_mode(true);
        hw.lever.set(0.0);
        hw.rollers.set(0.0);

        let mut pid = PidController::new(params.lever_k_p, params.lever_k_i, params.lever_k_d)
            .with_output_limit(params.lever_max_output);
        pid.set_setpoint(params.ride_pos);

        Self {
            lever_guard: CurrentGuard::new("Arm lever", params.lever_current_limit),
            params,
            hw,
            hub,
            tm,
            pid,
            pid_enabled: false,
            rollers: Rollers::Stop,
            action: None,
            clear_requested: false,
        }
    }

    pub fn setpoint(&self) -> f64 {
        self.pid.setpoint()
    }

    pub fn rollers(&self) -> Rollers {
        self.rollers
    }

    pub fn is_pid_enabled(&self) -> bool {
        self.pid_enabled
    }

    fn set_setpoint(&mut self, setpoint: f64) {
        if setpoint != self.pid.setpoint() {
            debug!("Arm setpoint {}", setpoint);
            self.pid.set_setpoint(setpoint);
        }
    }

    fn roller_demand(&self) -> f64 {
        match self.rollers {
            Rollers::In => self.params.intake_in_speed,
            Rollers::Out => self.params.intake_out_speed,
            Rollers::Idle => self.params.intake_idle_speed,
            Rollers::Stop => 0.0,
        }
    }

    /// Start a multi-cycle action, failing any action it replaces.
    fn start_action(&mut self, kind: ActionKind, duration_s: f64, now_s: f64, msg: &Message) {
        if let Some(old) = self.action.take() {
            warn!("Arm {:?} superseded by {:?}", old.kind, kind);
            reply(&self.hub, old.reply_to.as_deref(), Response::Error);
        }

        self.action = Some(ArmAction {
            kind,
            end_s: now_s + duration_s,
            reply_to: msg.reply_to.clone(),
        });
    }

    /// Finish the current action and answer its caller.
    fn end_action(&mut self, rsp: Response) {
        if let Some(action) = self.action.take() {
            debug!("Arm {:?} finished with {:?}", action.kind, rsp);
            reply(&self.hub, action.reply_to.as_deref(), rsp);

            // Drop teleop commands queued up while the action ran
            self.clear_requested = true;
        }
    }

    fn handle(&mut self, msg: &Message, now_s: f64) {
        let p = self.params.clone();

        match msg.command {
            Command::ArmFar => {
                self.set_setpoint(p.far_pos);
                self.rollers = Rollers::Stop;
            }
            Command::ArmClose => {
                self.set_setpoint(p.close_pos);
                self.rollers = Rollers::Stop;
            }
            Command::ArmMoveIntake => self.set_setpoint(p.intake_pos),
            Command::ArmMoveRide => {
                self.set_setpoint(p.ride_pos);
                self.rollers = Rollers::Idle;
            }
            Command::ArmMoveAfterShoot => self.set_setpoint(p.after_shoot_pos),
            Command::ArmIntake => match msg.arm() {
                Ok(a) if a.direction => {
                    // Drop to the intake position from ride, leave it if raised
                    if self.pid.setpoint() <= p.ride_pos {
                        self.set_setpoint(p.intake_pos);
                    }
                    self.rollers = Rollers::In;
                }
                Ok(_) => self.rollers = Rollers::Out,
                Err(e) => warn!("Bad arm intake message: {}", e),
            },
            Command::ArmIntakeOut => self.rollers = Rollers::Out,
            Command::ArmIntakeStop => {
                if self.pid.setpoint() == p.intake_pos {
                    self.set_setpoint(p.ride_pos);
                }
                self.rollers = Rollers::Idle;
            }
            Command::ArmEnable => {
                info!("Arm controller enabled");
                self.pid_enabled = true;
            }
            Command::AutonomousIntake => {
                let timeout_s = match msg.autonomous() {
                    Ok(a) if a.timeout_s > 0.0 => a.timeout_s,
                    Ok(a) => {
                        warn!("Invalid intake timeout {}", a.timeout_s);
                        reply(&self.hub, msg.reply_to.as_deref(), Response::Error);
                        return;
                    }
                    Err(e) => {
                        warn!("Bad autonomous intake message: {}", e);
                        reply(&self.hub, msg.reply_to.as_deref(), Response::Error);
                        return;
                    }
                };
                self.set_setpoint(p.intake_pos);
                self.rollers = Rollers::In;
                self.start_action(ActionKind::Intake, timeout_s, now_s, msg);
            }
            Command::AutonomousThrowup => {
                self.rollers = Rollers::Out;
                self.start_action(ActionKind::Throwup, p.throwup_s, now_s, msg);
            }
            Command::AutonomousAim => {
                self.set_setpoint(p.far_pos);
                self.start_action(ActionKind::Aim, p.aim_s, now_s, msg);
            }
            Command::AutonomousComplete => {
                if self.action.is_some() {
                    self.end_action(Response::Error);
                }
                self.rollers = Rollers::Idle;
            }
            Command::SystemMsgTimeout | Command::Unknown => (),
            c if c.is_state_change() => (),
            c => debug!("Arm ignoring {:?}", c),
        }
    }

    /// Advance the current action.
    fn step_action(&mut self, now_s: f64) {
        let (kind, end_s) = match &self.action {
            Some(a) => (a.kind, a.end_s),
            None => return,
        };

        match kind {
            ActionKind::Intake => {
                let current_a = self.hw.rollers.supply_current();
                if current_a > self.params.intake_current_threshold_a {
                    info!("Ball taken in ({:.1} A)", current_a);
                    self.rollers = Rollers::Stop;
                    self.set_setpoint(self.params.ride_pos);
                    self.end_action(Response::Ok);
                } else if now_s >= end_s {
                    warn!("No ball taken in before the intake timeout");
                    self.rollers = Rollers::Stop;
                    self.set_setpoint(self.params.ride_pos);
                    self.end_action(Response::Error);
                }
            }
            ActionKind::Throwup => {
                if now_s >= end_s {
                    self.rollers = Rollers::Stop;
                    self.end_action(Response::Ok);
                }
            }
            ActionKind::Aim => {
                if now_s >= end_s {
                    self.end_action(Response::Ok);
                }
            }
        }
    }
}

impl Component for Arm {
    fn name(&self) -> &str {
        "Arm"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        if self.action.is_some() {
            self.end_action(Response::Error);
        }

        self.pid_enabled = matches!(state, RobotState::Autonomous | RobotState::Teleoperated);
        self.pid.reset();
        self.pid.set_setpoint(self.params.ride_pos);
        self.rollers = match self.pid_enabled {
            true => Rollers::Idle,
            false => Rollers::Stop,
        };

        self.hw.lever.set(0.0);
        self.hw.rollers.set(0.0);
        self.lever_guard.reset(&mut *self.hw.lever);

        info!("Arm in {:?}, controller enabled: {}", state, self.pid_enabled);
    }

    fn run(&mut self, msg: &Message, now_s: f64) {
        self.handle(msg, now_s);
        self.step_action(now_s);

        let position = self.hw.lever.position();

        if self.pid_enabled {
            let mut source = LeverPosition(position);
            let mut output = LeverPower(&mut *self.hw.lever);
            self.pid.step(&mut source, &mut output, now_s);
        } else {
            self.hw.lever.set(0.0);
        }

        let rollers = match self.pid_enabled {
            true => self.roller_demand(),
            false => 0.0,
        };
        self.hw.rollers.set(rollers);

        self.lever_guard.police(&mut *self.hw.lever, now_s);

        self.tm.put_number("Arm Position", position);
        self.tm.put_number("Arm Setpoint", self.pid.setpoint());
        self.tm.put_string("Arm Rollers", &format!("{:?}", self.rollers));
        self.tm.put_number("Intake Current", self.hw.rollers.supply_current());
        self.tm.put_bool("Arm Tripped", self.lever_guard.is_tripped());
    }

    fn take_clear_request(&mut self) -> bool {
        std::mem::replace(&mut self.clear_requested, false)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimMotor, SimPlant, SimPlantParams};
    use comms_if::chan::ChannelReceiver;
    use comms_if::msg::{AutonomousParams, Payload};
    use comms_if::tm::NullTelemetry;

    const DT: f64 = 0.02;

    struct Rig {
        plant: SimPlant,
        lever: SimMotor,
        rollers: SimMotor,
        reply: ChannelReceiver,
        arm: Arm,
        now_s: f64,
    }

    impl Rig {
        fn new(state: RobotState) -> Self {
            let plant = SimPlant::new(SimPlantParams::default());
            let lever = plant.add_motor();
            let rollers = plant.add_motor();
            let hub = Arc::new(ChannelHub::new());
            let reply = hub.provision("reply").unwrap();

            let mut arm = Arm::new(
                ArmParams::default(),
                ArmHw {
                    lever: Box::new(lever.clone()),
                    rollers: Box::new(rollers.clone()),
                },
                hub,
                Arc::new(NullTelemetry),
            );
            arm.on_state_change(state, 0.0);

            Self {
                plant,
                lever,
                rollers,
                reply,
                arm,
                now_s: 0.0,
            }
        }

        fn cycle(&mut self, msg: &Message) {
            self.arm.run(msg, self.now_s);
            self.plant.step(DT);
            self.now_s += DT;
        }

        fn idle_for(&mut self, dur_s: f64) {
            let end_s = self.now_s + dur_s;
            while self.now_s < end_s {
                self.cycle(&Message::timeout());
            }
        }

        fn response(&self) -> Option<Response> {
            self.reply.try_receive().and_then(|m| m.command.response())
        }
    }

    fn auto_msg(cmd: Command, timeout_s: f64) -> Message {
        Message::new(
            cmd,
            Payload::Autonomous(AutonomousParams {
                timeout_s,
                ..AutonomousParams::default()
            }),
        )
        .unwrap()
        .with_reply_to("reply")
    }

    fn bare(cmd: Command) -> Message {
        Message::bare(cmd).unwrap()
    }

    #[test]
    fn test_lever_reaches_setpoint() {
        let mut rig = Rig::new(RobotState::Teleoperated);
        assert!(rig.arm.is_pid_enabled());

        rig.cycle(&bare(Command::ArmFar));
        rig.idle_for(3.0);
        assert!((rig.lever.position() - 1024.0).abs() < 5.0);
        assert_eq!(rig.rollers.demand(), 0.0);

        rig.cycle(&bare(Command::ArmMoveRide));
        rig.idle_for(3.0);
        assert!(rig.lever.position().abs() < 5.0);
        assert_eq!(rig.arm.rollers(), Rollers::Idle);
    }

    #[test]
    fn test_disabled_arm_is_still() {
        let mut rig = Rig::new(RobotState::Disabled);
        rig.cycle(&bare(Command::ArmFar));
        rig.idle_for(1.0);
        assert_eq!(rig.lever.position(), 0.0);
        assert_eq!(rig.lever.demand(), 0.0);
        assert_eq!(rig.rollers.demand(), 0.0);
    }

    #[test]
    fn test_teleop_intake() {
        let mut rig = Rig::new(RobotState::Teleoperated);
        let intake = Message::new(
            Command::ArmIntake,
            Payload::Arm(comms_if::msg::ArmParams { direction: true }),
        )
        .unwrap();

        rig.cycle(&intake);
        assert_eq!(rig.arm.setpoint(), -100.0);
        assert_eq!(rig.rollers.demand(), 0.5);

        // Releasing returns the arm to ride
        rig.cycle(&bare(Command::ArmIntakeStop));
        assert_eq!(rig.arm.setpoint(), 0.0);
        assert_eq!(rig.rollers.demand(), 0.1);
    }

    #[test]
    fn test_auto_intake() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_msg(Command::AutonomousIntake, 2.0));
        assert_eq!(rig.rollers.demand(), 0.5);
        rig.idle_for(0.5);
        assert_eq!(rig.response(), None);

        // Ball arrives
        rig.plant.set_load_current(&rig.rollers, 20.0);
        rig.cycle(&Message::timeout());
        assert_eq!(rig.response(), Some(Response::Ok));
        assert_eq!(rig.arm.setpoint(), 0.0);
        assert!(rig.arm.take_clear_request());
        assert!(!rig.arm.take_clear_request());
    }

    #[test]
    fn test_auto_intake_times_out() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_msg(Command::AutonomousIntake, 0.5));
        rig.idle_for(0.4);
        assert_eq!(rig.response(), None);
        rig.idle_for(0.2);
        assert_eq!(rig.response(), Some(Response::Error));
        assert_eq!(rig.rollers.demand(), 0.0);
    }

    #[test]
    fn test_timed_actions() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_msg(Command::AutonomousThrowup, 0.0));
        assert_eq!(rig.rollers.demand(), -1.0);
        rig.idle_for(0.9);
        assert_eq!(rig.response(), None);
        rig.idle_for(0.2);
        assert_eq!(rig.response(), Some(Response::Ok));

        rig.cycle(&auto_msg(Command::AutonomousAim, 0.0));
        assert_eq!(rig.arm.setpoint(), 1024.0);
        rig.idle_for(1.1);
        assert_eq!(rig.response(), Some(Response::Ok));
    }

    #[test]
    fn test_state_change_fails_action() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_msg(Command::AutonomousIntake, 3.0));
        rig.cycle(&bare(Command::ArmFar));

        rig.arm.on_state_change(RobotState::Disabled, rig.now_s);
        assert_eq!(rig.response(), Some(Response::Error));
        assert_eq!(rig.response(), None);
        assert!(!rig.arm.is_pid_enabled());
        assert_eq!(rig.arm.setpoint(), 0.0);
    }
}
