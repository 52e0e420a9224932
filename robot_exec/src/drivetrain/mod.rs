//! # Drivetrain
//!
//! Owns the two drive motors. The drivetrain holds a single current [`DriveMode`], replaced only
//! by mode changing commands, and every cycle computes its motor demands from that mode, the
//! latest sensor snapshot and the time. Teleop modes persist until the next drive command, motion
//! sessions run until they finish, time out or are superseded, and always answer their caller
//! exactly once.
//!
//! Whatever the mode, each cycle also feeds the cheezy filter so its estimate stays current.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod cheezy;
mod params;
mod seek;
mod straight;
mod teleop;
mod turn;

pub use params::Params;
pub use seek::{RangeSession, SeekSession, SeekTarget};
pub use straight::{heading_correction, StraightSession};
pub use turn::TurnSession;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::mem::discriminant;
use std::sync::Arc;
use thiserror::Error;

// Internal
use crate::current_guard::CurrentGuard;
use cheezy::{CheezyGoal, CheezyLoop, CheezyPosition};
use comms_if::{
    chan::ChannelHub,
    eqpt::{AngleSensor, BooleanSensor, ControlMode, MotorOutput, OffsetSensor},
    msg::{
        CheezyDriveParams, Command, Message, MessageError, Response, RobotState,
        SplitArcadeParams, TankDriveParams,
    },
    tm::Telemetry,
};
use util::maths::wrap_deg_180;
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The devices the drivetrain uses.
pub struct DriveHw {
    pub left: Box<dyn MotorOutput>,
    pub right: Box<dyn MotorOutput>,
    pub gyro: Arc<dyn AngleSensor>,
    pub range_sensor: Arc<dyn BooleanSensor>,
    pub goal_camera: Arc<dyn OffsetSensor>,
    pub ball_camera: Arc<dyn OffsetSensor>,
}

/// Everything the drive modes read in one cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Sensors {
    /// Units: counts
    pub left_counts: f64,

    /// Units: counts
    pub right_counts: f64,

    /// Units: degrees
    pub heading_deg: f64,

    /// Units: degrees/second
    pub rate_deg_s: f64,

    pub range_triggered: bool,
    pub goal_offset: Option<f64>,
    pub ball_offset: Option<f64>,
}

pub struct Drivetrain {
    params: Params,
    hw: DriveHw,
    hub: Arc<ChannelHub>,
    tm: Arc<dyn Telemetry>,
    cheezy: CheezyLoop,

    mode: DriveMode,
    state: RobotState,
    control_mode: ControlMode,

    /// Units: volts
    battery_v: f64,

    left_guard: CurrentGuard,
    right_guard: CurrentGuard,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The drivetrain's current behaviour.
#[derive(Debug, Clone)]
pub enum DriveMode {
    Stop,
    Tank(TankDriveParams),
    AutoMove(TankDriveParams),
    SplitArcade(SplitArcadeParams),
    Cheezy(CheezyDriveParams),
    MeasuredStraight(StraightSession),
    TimedStraight(StraightSession),
    Turn(TurnSession),
    Search(SeekSession),
    BallSearch(SeekSession),
    RangeSense(RangeSession),
}

/// Result of one cycle of a drive mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Left and right demands in [-1, 1]
    Drive(f64, f64),

    /// The motion session has finished with this result
    Done(Response),
}

#[derive(Debug, Error)]
pub enum DrivetrainError {
    #[error("Invalid {0} for {1:?}: {2}")]
    InvalidParam(&'static str, Command, f64),

    #[error("Cannot execute {0:?} while the robot is {1:?}")]
    NotEnabled(Command, RobotState),

    #[error("Malformed message: {0}")]
    MessageError(MessageError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveMode {
    pub fn name(&self) -> &'static str {
        match self {
            DriveMode::Stop => "Stop",
            DriveMode::Tank(_) => "Tank",
            DriveMode::AutoMove(_) => "AutoMove",
            DriveMode::SplitArcade(_) => "SplitArcade",
            DriveMode::Cheezy(_) => "Cheezy",
            DriveMode::MeasuredStraight(_) => "MeasuredStraight",
            DriveMode::TimedStraight(_) => "TimedStraight",
            DriveMode::Turn(_) => "Turn",
            DriveMode::Search(_) => "Search",
            DriveMode::BallSearch(_) => "BallSearch",
            DriveMode::RangeSense(_) => "RangeSense",
        }
    }

    /// The channel waiting on this mode's result, if any.
    pub fn reply_to(&self) -> Option<&str> {
        let reply = match self {
            DriveMode::MeasuredStraight(s) | DriveMode::TimedStraight(s) => &s.reply_to,
            DriveMode::Turn(s) => &s.reply_to,
            DriveMode::Search(s) | DriveMode::BallSearch(s) => &s.reply_to,
            DriveMode::RangeSense(s) => &s.reply_to,
            _ => return None,
        };
        reply.as_deref()
    }

    /// What this mode contributes to the cheezy filter's goal.
    fn cheezy_goal(&self, sensors: &Sensors, params: &Params) -> CheezyGoal {
        match self {
            DriveMode::Tank(p) | DriveMode::AutoMove(p) => CheezyGoal {
                wheel: (p.left - p.right) / 2.0,
                throttle: (p.left + p.right) / 2.0,
                quickturn: false,
            },
            DriveMode::SplitArcade(p) => CheezyGoal {
                wheel: p.wheel,
                throttle: match p.spin.abs() > params.arcade_dead_band {
                    true => 0.0,
                    false => p.throttle,
                },
                quickturn: false,
            },
            DriveMode::Cheezy(p) => CheezyGoal {
                wheel: p.wheel,
                throttle: p.throttle,
                quickturn: p.quickturn,
            },
            DriveMode::MeasuredStraight(s) | DriveMode::TimedStraight(s) => CheezyGoal {
                wheel: 0.0,
                throttle: s.speed,
                quickturn: false,
            },
            DriveMode::Turn(s) => CheezyGoal {
                wheel: 0.5 * s.heading_error_deg(sensors).signum(),
                throttle: 0.0,
                quickturn: false,
            },
            _ => CheezyGoal::default(),
        }
    }
}

impl Drivetrain {
    pub fn new(
        params: Params,
        mut hw: DriveHw,
        hub: Arc<ChannelHub>,
        tm: Arc<dyn Telemetry>,
        cheezy: CheezyLoop,
    ) -> Self {
        for m in [&mut hw.left, &mut hw.right].iter_mut() {
            m.set_brake_mode(params.brake_mode);
            m.set_control_mode(ControlMode::Power);
            m.set(0.0);
            m.enable();
        }

        Self {
            left_guard: CurrentGuard::new("Left drive", params.current_limit),
            right_guard: CurrentGuard::new("Right drive", params.current_limit),
            params,
            hw,
            hub,
            tm,
            cheezy,
            mode: DriveMode::Stop,
            state: RobotState::Disabled,
            control_mode: ControlMode::Power,
            battery_v: 12.0,
        }
    }

    pub fn mode(&self) -> &DriveMode {
        &self.mode
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn battery_v(&self) -> f64 {
        self.battery_v
    }

    fn sensors(&self) -> Sensors {
        Sensors {
            left_counts: self.hw.left.position(),
            right_counts: self.hw.right.position(),
            heading_deg: self.hw.gyro.heading_deg(),
            rate_deg_s: self.hw.gyro.rate_deg_s(),
            range_triggered: self.hw.range_sensor.read(),
            goal_offset: self.hw.goal_camera.try_get_offset(),
            ball_offset: self.hw.ball_camera.try_get_offset(),
        }
    }

    /// Send demands in [-1, 1] to the motors in the current control mode.
    fn write_motors(&mut self, left: f64, right: f64) {
        let scale = match self.control_mode {
            ControlMode::Power => 1.0,
            ControlMode::Velocity => self.params.full_speed_counts_s,
        };

        self.hw.left.set(left * scale);
        self.hw.right.set(right * scale);
    }

    fn neutral(&mut self) {
        self.write_motors(0.0, 0.0);
    }

    fn respond(&self, reply_to: Option<&str>, rsp: Response) {
        if let Some(channel) = reply_to {
            if let Err(e) = self.hub.send(channel, &Message::response(rsp)) {
                warn!("Could not send {:?} to {:?}: {}", rsp, channel, e);
            }
        }
    }

    /// Finish the active motion session, stopping the motors and answering the caller.
    fn end_session(&mut self, rsp: Response) {
        let reply_to = self.mode.reply_to().map(String::from);

        debug!("{} finished with {:?}", self.mode.name(), rsp);

        self.neutral();
        self.mode = DriveMode::Stop;
        self.respond(reply_to.as_deref(), rsp);
    }

    /// Replace the current mode, failing any session it supersedes.
    fn set_mode(&mut self, mode: DriveMode) {
        if let Some(reply_to) = self.mode.reply_to().map(String::from) {
            warn!(
                "{} superseded by {} before finishing",
                self.mode.name(),
                mode.name()
            );
            self.neutral();
            self.respond(Some(&reply_to), Response::Error);
        }

        if discriminant(&self.mode) != discriminant(&mode) || mode.reply_to().is_some() {
            info!("Drive mode: {}", mode.name());
        }

        self.mode = mode;
    }

    /// Apply a received command.
    fn handle(&mut self, msg: &Message, now_s: f64) -> Result<(), DrivetrainError> {
        let cmd = msg.command;
        let reply_to = msg.reply_to.clone();

        if is_motion(cmd) && !self.state.is_enabled() {
            return Err(DrivetrainError::NotEnabled(cmd, self.state));
        }

        match cmd {
            Command::DrivetrainDriveTank | Command::DrivetrainAutoMove => {
                let p = msg.tank_drive().map_err(DrivetrainError::MessageError)?;
                check_unit("left", cmd, p.left)?;
                check_unit("right", cmd, p.right)?;

                self.set_mode(match cmd {
                    Command::DrivetrainDriveTank => DriveMode::Tank(p),
                    _ => DriveMode::AutoMove(p),
                });
            }
            Command::DrivetrainDriveSplitArcade => {
                let p = msg.split_arcade().map_err(DrivetrainError::MessageError)?;
                check_unit("wheel", cmd, p.wheel)?;
                check_unit("throttle", cmd, p.throttle)?;
                check_unit("spin", cmd, p.spin)?;
                self.set_mode(DriveMode::SplitArcade(p));
            }
            Command::DrivetrainDriveCheezy => {
                let p = msg.cheezy_drive().map_err(DrivetrainError::MessageError)?;
                check_unit("wheel", cmd, p.wheel)?;
                check_unit("throttle", cmd, p.throttle)?;
                self.set_mode(DriveMode::Cheezy(p));
            }
            Command::DrivetrainMeasuredStraight => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_nonzero_unit("speed", cmd, p.drive_speed)?;
                check_positive("distance", cmd, p.drive_distance_in)?;
                check_positive("timeout", cmd, p.timeout_s)?;

                let session = StraightSession::measured(
                    p.drive_speed,
                    p.drive_distance_in,
                    p.timeout_s,
                    &self.sensors(),
                    now_s,
                    reply_to,
                    &self.params,
                );
                self.set_mode(DriveMode::MeasuredStraight(session));
            }
            Command::DrivetrainStraight => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_unit("speed", cmd, p.drive_speed)?;
                check_positive("duration", cmd, p.drive_time_s)?;

                let session = StraightSession::timed(
                    p.drive_speed,
                    p.drive_time_s,
                    &self.sensors(),
                    now_s,
                    reply_to,
                );
                self.set_mode(DriveMode::TimedStraight(session));
            }
            Command::DrivetrainTurn => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_finite("angle", cmd, p.turn_angle_deg)?;
                check_positive("timeout", cmd, p.timeout_s)?;

                let session = TurnSession::new(
                    p.turn_angle_deg,
                    p.timeout_s,
                    &self.sensors(),
                    now_s,
                    reply_to,
                    &self.params,
                );
                debug!(
                    "Turning {:.1} deg to {:.1} deg",
                    p.turn_angle_deg, session.target_deg
                );
                self.set_mode(DriveMode::Turn(session));
            }
            Command::AutonomousSearchGoal | Command::AutonomousSearchBall => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_positive("timeout", cmd, p.timeout_s)?;

                let (target, wrap): (SeekTarget, fn(SeekSession) -> DriveMode) = match cmd {
                    Command::AutonomousSearchGoal => (SeekTarget::Goal, DriveMode::Search),
                    _ => (SeekTarget::Ball, DriveMode::BallSearch),
                };
                self.set_mode(wrap(SeekSession::new(target, p.timeout_s, now_s, reply_to)));
            }
            Command::DrivetrainRangeSense => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_nonzero_unit("speed", cmd, p.drive_speed)?;
                check_positive("timeout", cmd, p.timeout_s)?;

                let session = RangeSession::new(p.drive_speed, p.timeout_s, now_s, reply_to);
                self.set_mode(DriveMode::RangeSense(session));
            }
            Command::DrivetrainStop | Command::AutonomousComplete => {
                self.set_mode(DriveMode::Stop);
                self.neutral();
                self.respond(reply_to.as_deref(), Response::Ok);
            }
            Command::DrivetrainSetAngle => {
                let p = msg.autonomous().map_err(DrivetrainError::MessageError)?;
                check_finite("angle", cmd, p.turn_angle_deg)?;
                self.hw.gyro.set_heading(p.turn_angle_deg);
                debug!("Heading set to {:.1} deg", p.turn_angle_deg);
            }
            Command::DrivetrainZeroGyro => {
                self.hw.gyro.zero();
                debug!("Gyro zeroed");
            }
            Command::SystemConstants => {
                let p = msg.system().map_err(DrivetrainError::MessageError)?;
                check_positive("battery voltage", cmd, p.battery_v)?;
                self.battery_v = p.battery_v;
            }
            Command::SystemMsgTimeout | Command::Unknown => (),
            c if c.is_state_change() => (),
            c => debug!("Drivetrain ignoring {:?}", c),
        }

        Ok(())
    }

    /// Advance the current mode by one cycle.
    fn step_mode(&mut self, sensors: &Sensors, now_s: f64) -> Option<Step> {
        let params = &self.params;

        match &mut self.mode {
            DriveMode::Stop => Some(Step::Drive(0.0, 0.0)),
            DriveMode::Tank(p) => {
                let (l, r) = teleop::tank(p);
                Some(Step::Drive(l, r))
            }
            DriveMode::AutoMove(p) => Some(Step::Drive(p.left, p.right)),
            DriveMode::SplitArcade(p) => {
                let (l, r) = teleop::split_arcade(p, params);
                Some(Step::Drive(l, r))
            }
            // Driven from the filter output
            DriveMode::Cheezy(_) => None,
            DriveMode::MeasuredStraight(s) | DriveMode::TimedStraight(s) => {
                Some(s.step(sensors, now_s, params))
            }
            DriveMode::Turn(s) => Some(s.step(sensors, now_s, params)),
            DriveMode::Search(s) | DriveMode::BallSearch(s) => Some(s.step(sensors, now_s, params)),
            DriveMode::RangeSense(s) => Some(s.step(sensors, now_s, params)),
        }
    }

    fn publish(&self, sensors: &Sensors) {
        let (heading_error, distance) = match &self.mode {
            DriveMode::Turn(s) => (s.heading_error_deg(sensors), 0.0),
            DriveMode::MeasuredStraight(s) | DriveMode::TimedStraight(s) => {
                (s.heading_error_deg(sensors), s.travelled_counts(sensors))
            }
            _ => (0.0, 0.0),
        };

        self.tm.put_string("Drive Mode", self.mode.name());
        self.tm.put_number("Heading", wrap_deg_180(sensors.heading_deg));
        self.tm.put_number("Heading Error", heading_error);
        self.tm.put_number("Drive Distance", distance);
        self.tm.put_number("Battery Voltage", self.battery_v);
        self.tm.put_bool("Left Drive Tripped", self.left_guard.is_tripped());
        self.tm.put_bool("Right Drive Tripped", self.right_guard.is_tripped());
    }
}

impl Component for Drivetrain {
    fn name(&self) -> &str {
        "Drivetrain"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        // Fail anything still running, it was started for the previous state
        if self.mode.reply_to().is_some() {
            self.end_session(Response::Error);
        }

        self.control_mode = match state {
            RobotState::Autonomous => ControlMode::Velocity,
            _ => ControlMode::Power,
        };
        self.hw.left.set_control_mode(self.control_mode);
        self.hw.right.set_control_mode(self.control_mode);

        self.neutral();
        self.left_guard.reset(&mut *self.hw.left);
        self.right_guard.reset(&mut *self.hw.right);

        self.mode = DriveMode::Stop;
        self.state = state;

        info!(
            "Drivetrain in {:?}, {:?} control",
            state, self.control_mode
        );
    }

    fn run(&mut self, msg: &Message, now_s: f64) {
        if let Err(e) = self.handle(msg, now_s) {
            warn!("Drivetrain rejected {:?}: {}", msg.command, e);
            self.respond(msg.reply_to.as_deref(), Response::Error);
        }

        let sensors = self.sensors();

        match self.step_mode(&sensors, now_s) {
            Some(Step::Drive(l, r)) => self.write_motors(l, r),
            Some(Step::Done(rsp)) => self.end_session(rsp),
            None => (),
        }

        // Keep the filter warm whatever the mode
        let cheezy_enabled = matches!(self.mode, DriveMode::Cheezy(_));
        let goal = self.mode.cheezy_goal(&sensors, &self.params);
        let position = CheezyPosition {
            left_counts: sensors.left_counts,
            right_counts: sensors.right_counts,
            heading_deg: sensors.heading_deg,
            battery_v: self.battery_v,
        };

        match self.cheezy.update(goal, position, cheezy_enabled, now_s) {
            Ok(out) => {
                let nominal_v = self.params.cheezy.nominal_voltage_v;
                self.tm.put_number("Cheezy Left V", out.left_voltage);
                self.tm.put_number("Cheezy Right V", out.right_voltage);

                if cheezy_enabled {
                    self.write_motors(out.left_voltage / nominal_v, out.right_voltage / nominal_v);
                }
            }
            Err(e) => {
                warn!("Cheezy filter unavailable: {}", e);
                if cheezy_enabled {
                    self.neutral();
                }
            }
        }

        self.left_guard.police(&mut *self.hw.left, now_s);
        self.right_guard.police(&mut *self.hw.right, now_s);

        self.publish(&sensors);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Commands which move the robot.
fn is_motion(cmd: Command) -> bool {
    matches!(
        cmd,
        Command::DrivetrainDriveTank
            | Command::DrivetrainAutoMove
            | Command::DrivetrainDriveSplitArcade
            | Command::DrivetrainDriveCheezy
            | Command::DrivetrainMeasuredStraight
            | Command::DrivetrainStraight
            | Command::DrivetrainTurn
            | Command::DrivetrainRangeSense
            | Command::AutonomousSearchGoal
            | Command::AutonomousSearchBall
    )
}

fn check_finite(name: &'static str, cmd: Command, value: f64) -> Result<(), DrivetrainError> {
    match value.is_finite() {
        true => Ok(()),
        false => Err(DrivetrainError::InvalidParam(name, cmd, value)),
    }
}

fn check_unit(name: &'static str, cmd: Command, value: f64) -> Result<(), DrivetrainError> {
    match value.is_finite() && value.abs() <= 1.0 {
        true => Ok(()),
        false => Err(DrivetrainError::InvalidParam(name, cmd, value)),
    }
}

fn check_nonzero_unit(name: &'static str, cmd: Command, value: f64) -> Result<(), DrivetrainError> {
    check_unit(name, cmd, value)?;
    match value != 0.0 {
        true => Ok(()),
        false => Err(DrivetrainError::InvalidParam(name, cmd, value)),
    }
}

fn check_positive(name: &'static str, cmd: Command, value: f64) -> Result<(), DrivetrainError> {
    match value.is_finite() && value > 0.0 {
        true => Ok(()),
        false => Err(DrivetrainError::InvalidParam(name, cmd, value)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimCamera, SimGyro, SimMotor, SimPlant, SimPlantParams, SimSwitch};
    use cheezy::CheezyParams;
    use comms_if::chan::ChannelReceiver;
    use comms_if::msg::{AutonomousParams, Payload, SystemParams};
    use comms_if::tm::NullTelemetry;

    const DT: f64 = 0.02;

    struct Harness {
        plant: SimPlant,
        left: SimMotor,
        right: SimMotor,
        gyro: SimGyro,
        range: SimSwitch,
        reply: ChannelReceiver,
        drive: Drivetrain,
        now_s: f64,
    }

    impl Harness {
        fn new(state: RobotState) -> Self {
            let plant = SimPlant::new(SimPlantParams::default());
            let (left, right) = plant.drive_motors();
            let gyro = plant.gyro();
            let range = SimSwitch::default();
            let hub = Arc::new(ChannelHub::new());
            let reply = hub.provision("reply").unwrap();

            let hw = DriveHw {
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
                gyro: Arc::new(gyro.clone()),
                range_sensor: Arc::new(range.clone()),
                goal_camera: Arc::new(SimCamera::default()),
                ball_camera: Arc::new(SimCamera::default()),
            };

            let mut drive = Drivetrain::new(
                Params::default(),
                hw,
                hub.clone(),
                Arc::new(NullTelemetry),
                CheezyLoop::new(CheezyParams::default()),
            );
            drive.on_state_change(state, 0.0);

            Self {
                plant,
                left,
                right,
                gyro,
                range,
                reply,
                drive,
                now_s: 0.0,
            }
        }

        fn cycle(&mut self, msg: &Message) {
            self.drive.run(msg, self.now_s);
            self.plant.step(DT);
            self.now_s += DT;
        }

        fn idle(&mut self) {
            self.cycle(&Message::timeout())
        }

        fn response(&self) -> Option<Response> {
            self.reply.try_receive().and_then(|m| m.command.response())
        }

        /// Idle until a response arrives, or give up after `max_s`.
        fn wait_response(&mut self, max_s: f64) -> Option<Response> {
            let end_s = self.now_s + max_s;
            while self.now_s < end_s {
                self.idle();
                if let Some(r) = self.response() {
                    return Some(r);
                }
            }
            None
        }
    }

    fn auto_msg(cmd: Command, p: AutonomousParams) -> Message {
        Message::new(cmd, Payload::Autonomous(p))
            .unwrap()
            .with_reply_to("reply")
    }

    fn mmove(speed: f64, distance_in: f64, timeout_s: f64) -> Message {
        auto_msg(
            Command::DrivetrainMeasuredStraight,
            AutonomousParams {
                drive_speed: speed,
                drive_distance_in: distance_in,
                timeout_s,
                ..AutonomousParams::default()
            },
        )
    }

    fn turn(angle_deg: f64, timeout_s: f64) -> Message {
        auto_msg(
            Command::DrivetrainTurn,
            AutonomousParams {
                turn_angle_deg: angle_deg,
                timeout_s,
                ..AutonomousParams::default()
            },
        )
    }

    /// Run a measured move from rest and return where the encoders stopped.
    fn measured_stop_counts() -> (f64, f64) {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&mmove(0.5, 24.0, 5.0));
        assert_eq!(h.wait_response(5.0), Some(Response::Ok));

        // Motors neutral once finished
        h.idle();
        assert_eq!(h.left.demand(), 0.0);
        assert_eq!(h.right.demand(), 0.0);
        assert!(matches!(h.drive.mode(), DriveMode::Stop));

        (h.left.position(), h.right.position())
    }

    #[test]
    fn test_measured_move_is_repeatable() {
        let first = measured_stop_counts();
        let second = measured_stop_counts();
        assert_eq!(first, second);

        // Stopped within one cycle of travel past the target
        let target = Params::default().inches_to_counts(24.0);
        let per_cycle = 0.5 * 2800.0 * DT;
        assert!(first.0 >= target && first.0 < target + per_cycle + 1e-6);
    }

    #[test]
    fn test_autonomous_uses_velocity_control() {
        let mut h = Harness::new(RobotState::Autonomous);
        assert_eq!(h.drive.control_mode(), ControlMode::Velocity);
        assert_eq!(h.left.control_mode(), ControlMode::Velocity);

        h.cycle(&mmove(0.5, 24.0, 5.0));
        assert!((h.left.demand() - 1400.0).abs() < 1e-6);

        h.drive.on_state_change(RobotState::Teleoperated, h.now_s);
        assert_eq!(h.left.control_mode(), ControlMode::Power);
        assert_eq!(h.left.demand(), 0.0);
    }

    #[test]
    fn test_turn_round_trip() {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&turn(90.0, 3.0));
        assert_eq!(h.wait_response(3.5), Some(Response::Ok));
        assert!((wrap_deg_180(h.gyro.heading_deg()) - 90.0).abs() < 2.0);
    }

    #[test]
    fn test_superseded_session_fails() {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&mmove(0.5, 100.0, 5.0));
        h.idle();
        assert_eq!(h.response(), None);

        h.cycle(&turn(45.0, 2.0));
        assert_eq!(h.response(), Some(Response::Error));
        assert!(matches!(h.drive.mode(), DriveMode::Turn(_)));
    }

    #[test]
    fn test_state_change_fails_pending_session() {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&mmove(0.5, 100.0, 5.0));

        h.drive.on_state_change(RobotState::Disabled, h.now_s);
        assert_eq!(h.response(), Some(Response::Error));
        assert!(matches!(h.drive.mode(), DriveMode::Stop));
        assert_eq!(h.left.demand(), 0.0);
        assert_eq!(h.response(), None);
    }

    #[test]
    fn test_bad_parameters_rejected() {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&turn(30.0, 2.0));

        // Rejected without disturbing the turn in progress
        h.cycle(&mmove(1.5, 24.0, 5.0));
        assert_eq!(h.response(), Some(Response::Error));
        assert!(matches!(h.drive.mode(), DriveMode::Turn(_)));

        h.cycle(&mmove(0.5, f64::NAN, 5.0));
        assert_eq!(h.response(), Some(Response::Error));
        h.cycle(&turn(10.0, 0.0));
        assert_eq!(h.response(), Some(Response::Error));
        assert!(matches!(h.drive.mode(), DriveMode::Turn(_)));

        // Only one answer for the turn itself, once it finishes
        assert_eq!(h.wait_response(3.0), Some(Response::Ok));
        assert_eq!(h.response(), None);
    }

    #[test]
    fn test_motion_rejected_while_disabled() {
        let mut h = Harness::new(RobotState::Disabled);
        h.cycle(&mmove(0.5, 24.0, 5.0));
        assert_eq!(h.response(), Some(Response::Error));
        assert!(matches!(h.drive.mode(), DriveMode::Stop));
    }

    #[test]
    fn test_range_sense_round_trip() {
        let mut h = Harness::new(RobotState::Autonomous);
        h.cycle(&auto_msg(
            Command::DrivetrainRangeSense,
            AutonomousParams {
                drive_speed: 0.3,
                timeout_s: 4.0,
                ..AutonomousParams::default()
            },
        ));
        h.idle();
        assert_eq!(h.response(), None);

        h.range.set(true);
        assert_eq!(h.wait_response(0.1), Some(Response::Ok));
    }

    #[test]
    fn test_teleop_modes() {
        let mut h = Harness::new(RobotState::Teleoperated);

        let tank = Message::new(
            Command::DrivetrainDriveTank,
            Payload::TankDrive(TankDriveParams {
                left: 0.5,
                right: -0.5,
            }),
        )
        .unwrap();
        h.cycle(&tank);
        assert_eq!(h.left.demand(), 0.125);
        assert_eq!(h.right.demand(), -0.125);

        // The mode persists without further commands
        h.idle();
        assert_eq!(h.left.demand(), 0.125);

        let stop = Message::bare(Command::DrivetrainStop).unwrap();
        h.cycle(&stop);
        assert_eq!(h.left.demand(), 0.0);
    }

    #[test]
    fn test_cheezy_output_applied() {
        let mut h = Harness::new(RobotState::Teleoperated);
        let cheezy = Message::new(
            Command::DrivetrainDriveCheezy,
            Payload::CheezyDrive(CheezyDriveParams {
                wheel: 0.0,
                throttle: 1.0,
                quickturn: false,
            }),
        )
        .unwrap();

        for _ in 0..20 {
            h.cycle(&cheezy);
        }
        assert!((h.left.demand() - 1.0).abs() < 1e-6);
        assert!((h.right.demand() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gyro_and_constants() {
        let mut h = Harness::new(RobotState::Disabled);

        h.cycle(&auto_msg(
            Command::DrivetrainSetAngle,
            AutonomousParams {
                turn_angle_deg: 42.0,
                ..AutonomousParams::default()
            },
        ));
        assert_eq!(h.gyro.heading_deg(), 42.0);

        h.cycle(&Message::bare(Command::DrivetrainZeroGyro).unwrap());
        assert_eq!(h.gyro.heading_deg(), 0.0);

        let constants = Message::new(
            Command::SystemConstants,
            Payload::System(SystemParams { battery_v: 11.5 }),
        )
        .unwrap();
        h.cycle(&constants);
        assert_eq!(h.drive.battery_v(), 11.5);
    }

    #[test]
    fn test_current_guard_trips_one_side() {
        let mut h = Harness::new(RobotState::Teleoperated);
        let tank = Message::new(
            Command::DrivetrainDriveTank,
            Payload::TankDrive(TankDriveParams {
                left: 1.0,
                right: 1.0,
            }),
        )
        .unwrap();

        h.plant.set_load_current(&h.left, 100.0);
        for _ in 0..60 {
            h.cycle(&tank);
        }
        assert!(!h.left.is_enabled());
        assert!(h.right.is_enabled());

        // Cleared by the next state change
        h.drive.on_state_change(RobotState::Teleoperated, h.now_s);
        assert!(h.left.is_enabled());
    }
}
