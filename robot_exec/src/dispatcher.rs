//! # Dispatcher
//!
//! The central owner of the robot state. Every outer cycle the dispatcher first announces any
//! state change to every subsystem, then (in teleop only) turns the operator's controller into
//! commands for the subsystems. In autonomous the sequencer is the only source of commands.
//!
//! Most operator commands are level-triggered: they are sent every cycle the button is held.
//! Zeroing the gyro, starting and stopping a search, and starting a shot only fire on the press.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

// Internal
use crate::auto::SeqControl;
use crate::channels;
use crate::params::{ExecParams, JoystickLayout};
use comms_if::{
    chan::ChannelHub,
    eqpt::{HumanInput, PowerMonitor},
    msg::{
        ArmParams, AutonomousParams, CheezyDriveParams, Command, Message, Payload, RobotState,
        SystemParams,
    },
};
use util::time::Clock;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Interval at which the shot sequence checks its clock while waiting.
const SEQUENCE_POLL_S: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    params: ExecParams,
    layout: JoystickLayout,
    hub: Arc<ChannelHub>,
    input: Box<dyn HumanInput>,
    power: Arc<dyn PowerMonitor>,

    /// The last state announced to the subsystems
    state: Option<RobotState>,

    /// Button states in the previous cycle, for edge detection
    prev: Buttons,

    /// End time of an operator requested search, if one is running
    search_end_s: Option<f64>,

    shot: ShotSequence,
    num_cycles: u64,

    /// Sequencer flags, updated before a state change reaches any subsystem
    sequencer: Option<SeqControl>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Buttons {
    zero_gyro: bool,
    search_on: bool,
    search_off: bool,
    shoot: bool,
    intake: bool,
}

/// A fixed series of one-way commands separated by waits, run on its own thread.
///
/// Only one run may be in progress, further requests are ignored until it ends.
#[derive(Clone)]
pub struct ShotSequence {
    hub: Arc<ChannelHub>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    steps: Vec<SequenceStep>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceStep {
    pub channel: &'static str,
    pub command: Command,

    /// Time to wait after sending the command.
    ///
    /// Units: seconds
    pub wait_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Dispatcher {
    pub fn new(
        params: ExecParams,
        layout: JoystickLayout,
        hub: Arc<ChannelHub>,
        input: Box<dyn HumanInput>,
        power: Arc<dyn PowerMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shot = ShotSequence::new(
            hub.clone(),
            clock,
            vec![
                SequenceStep {
                    channel: channels::ARM,
                    command: Command::ArmClose,
                    wait_s: params.shot_arm_settle_s,
                },
                SequenceStep {
                    channel: channels::SHOOTER,
                    command: Command::ShooterShoot,
                    wait_s: params.shot_fire_s,
                },
                SequenceStep {
                    channel: channels::ARM,
                    command: Command::ArmMoveAfterShoot,
                    wait_s: 0.0,
                },
            ],
        );

        Self {
            params,
            layout,
            hub,
            input,
            power,
            state: None,
            prev: Buttons::default(),
            search_end_s: None,
            shot,
            num_cycles: 0,
            sequencer: None,
        }
    }

    /// Pause or resume the sequencer directly on state changes.
    ///
    /// A subsystem answering a round trip with an error as it leaves autonomous must never be
    /// seen by the sequencer before the pause.
    pub fn with_sequencer(mut self, control: SeqControl) -> Self {
        self.sequencer = Some(control);
        self
    }

    pub fn state(&self) -> Option<RobotState> {
        self.state
    }

    pub fn is_shot_running(&self) -> bool {
        self.shot.is_running()
    }

    /// Run one outer cycle with the robot in `state`.
    pub fn cycle(&mut self, state: RobotState, now_s: f64) {
        if self.state != Some(state) {
            self.announce(state);
        }

        if self.num_cycles % self.params.battery_divider.max(1) == 0 {
            let msg = Message::new(
                Command::SystemConstants,
                Payload::System(SystemParams {
                    battery_v: self.power.supply_voltage(),
                }),
            );
            match msg {
                Ok(m) => self.send(channels::DRIVE, &m),
                Err(e) => warn!("Could not build the supply voltage message: {}", e),
            }
        }
        self.num_cycles += 1;

        if state == RobotState::Teleoperated {
            self.operator(now_s);
        }
    }

    /// Broadcast a state change to every subsystem.
    fn announce(&mut self, state: RobotState) {
        info!("Robot state {:?}", state);

        if let Some(control) = &self.sequencer {
            match state {
                RobotState::Autonomous => control.enter_auto(),
                _ => control.leave_auto(),
            }
        }

        let msg = Message::state_change(state);
        for channel in channels::STATE_LISTENERS.iter() {
            self.send(channel, &msg);
        }

        self.state = Some(state);
        self.search_end_s = None;
        self.prev = Buttons::default();
    }

    /// Map the operator's controller onto subsystem commands.
    fn operator(&mut self, now_s: f64) {
        let l = self.layout.clone();
        let input: &dyn HumanInput = &*self.input;
        let pressed = |id: u32| input.button(id);

        let buttons = Buttons {
            zero_gyro: pressed(l.zero_gyro_button),
            search_on: pressed(l.search_on_button),
            search_off: pressed(l.search_off_button),
            shoot: pressed(l.shoot_button),
            intake: pressed(l.intake_in_button) || pressed(l.intake_out_button),
        };
        let prev = std::mem::replace(&mut self.prev, buttons);

        // ---- DRIVETRAIN ----

        if buttons.zero_gyro && !prev.zero_gyro {
            self.send_bare(channels::DRIVE, Command::DrivetrainZeroGyro);
        }

        if let Some(end_s) = self.search_end_s {
            if now_s >= end_s {
                self.search_end_s = None;
            }
        }

        if buttons.search_on && !prev.search_on {
            info!("Operator goal search");
            self.send_payload(
                channels::DRIVE,
                Command::AutonomousSearchGoal,
                Payload::Autonomous(AutonomousParams {
                    timeout_s: self.params.teleop_search_timeout_s,
                    ..AutonomousParams::default()
                }),
            );
            self.search_end_s = Some(now_s + self.params.teleop_search_timeout_s);
        }
        if buttons.search_off && !prev.search_off && self.search_end_s.is_some() {
            info!("Operator search cancelled");
            self.send_bare(channels::DRIVE, Command::DrivetrainStop);
            self.search_end_s = None;
        }

        let hang = pressed(l.hang_button);

        if self.search_end_s.is_none() {
            let throttle = match l.invert_throttle {
                true => -input.axis(l.throttle_axis),
                false => input.axis(l.throttle_axis),
            };

            let drive = match hang {
                true => CheezyDriveParams {
                    wheel: 0.0,
                    throttle: self.params.hang_creep_throttle,
                    quickturn: false,
                },
                false => CheezyDriveParams {
                    wheel: input.axis(l.wheel_axis),
                    throttle,
                    quickturn: pressed(l.quickturn_button),
                },
            };
            self.send_payload(
                channels::DRIVE,
                Command::DrivetrainDriveCheezy,
                Payload::CheezyDrive(drive),
            );
        }

        // ---- ARM ----

        if pressed(l.arm_enable_button) {
            self.send_bare(channels::ARM, Command::ArmEnable);
        }

        if pressed(l.arm_far_button) {
            self.send_bare(channels::ARM, Command::ArmFar);
        } else if pressed(l.arm_close_button) {
            self.send_bare(channels::ARM, Command::ArmClose);
        } else if pressed(l.arm_intake_pos_button) {
            self.send_bare(channels::ARM, Command::ArmMoveIntake);
        } else if pressed(l.arm_ride_button) {
            self.send_bare(channels::ARM, Command::ArmMoveRide);
        }

        if pressed(l.intake_in_button) {
            self.send_payload(
                channels::ARM,
                Command::ArmIntake,
                Payload::Arm(ArmParams { direction: true }),
            );
        } else if pressed(l.intake_out_button) {
            self.send_payload(
                channels::ARM,
                Command::ArmIntake,
                Payload::Arm(ArmParams { direction: false }),
            );
        } else if prev.intake {
            self.send_bare(channels::ARM, Command::ArmIntakeStop);
        }

        // ---- TAIL ----

        match (pressed(l.tail_up_button), pressed(l.tail_down_button)) {
            (true, false) => self.send_bare(channels::TAIL, Command::TailRaise),
            (false, true) => self.send_bare(channels::TAIL, Command::TailLower),
            _ => (),
        }

        // ---- SHOOTER AND HANGER ----

        if buttons.shoot && !prev.shoot && !self.shot.start() {
            debug!("Shot requested while the sequence is running");
        }

        if hang {
            self.send_bare(channels::HANGER, Command::HangerHang);
        }
    }

    fn send(&self, channel: &str, msg: &Message) {
        if let Err(e) = self.hub.send(channel, msg) {
            warn!("Could not send {:?} to {:?}: {}", msg.command, channel, e);
        }
    }

    fn send_bare(&self, channel: &str, cmd: Command) {
        match Message::bare(cmd) {
            Ok(m) => self.send(channel, &m),
            Err(e) => warn!("Could not build {:?}: {}", cmd, e),
        }
    }

    fn send_payload(&self, channel: &str, cmd: Command, payload: Payload) {
        match Message::new(cmd, payload) {
            Ok(m) => self.send(channel, &m),
            Err(e) => warn!("Could not build {:?}: {}", cmd, e),
        }
    }
}

impl ShotSequence {
    pub fn new(hub: Arc<ChannelHub>, clock: Arc<dyn Clock>, steps: Vec<SequenceStep>) -> Self {
        Self {
            hub,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            steps,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a run, returning false if one is already in progress.
    pub fn start(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let seq = self.clone();
        let spawned = thread::Builder::new()
            .name("tShotSeq".into())
            .spawn(move || {
                seq.run();
                seq.running.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not start the shot sequence: {}", e);
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    fn run(&self) {
        info!("Shot sequence started");

        for step in self.steps.iter() {
            let msg = match Message::bare(step.command) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Shot sequence cannot send {:?}: {}", step.command, e);
                    return;
                }
            };
            if let Err(e) = self.hub.send(step.channel, &msg) {
                warn!("Shot sequence could not send {:?}: {}", step.command, e);
            }

            let end_s = self.clock.now_s() + step.wait_s;
            while self.clock.now_s() < end_s {
                self.clock.sleep(SEQUENCE_POLL_S);
            }
        }

        info!("Shot sequence complete");
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The state of the simulated match at `time_s`, or `None` once the match is over.
///
/// The match is disabled before and after, with autonomous then teleop between.
pub fn scheduled_state(params: &ExecParams, time_s: f64) -> Option<RobotState> {
    let auto_start_s = params.pre_match_s;
    let teleop_start_s = auto_start_s + params.autonomous_s;
    let teleop_end_s = teleop_start_s + params.teleop_s;

    if time_s < auto_start_s {
        Some(RobotState::Disabled)
    } else if time_s < teleop_start_s {
        Some(RobotState::Autonomous)
    } else if time_s < teleop_end_s {
        Some(RobotState::Teleoperated)
    } else if time_s < teleop_end_s + params.pre_match_s {
        Some(RobotState::Disabled)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::auto::{Params as AutoParams, SeqState, Sequencer};
    use crate::sim::{SimJoystick, SimPowerMonitor};
    use crate::telemetry::TmStore;
    use comms_if::{chan::ChannelReceiver, msg::Response, tm::TmValue};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};
    use util::time::{ManualClock, MonotonicClock};

    struct Rig {
        joystick: SimJoystick,
        rx: HashMap<&'static str, ChannelReceiver>,
        dispatcher: Dispatcher,
    }

    impl Rig {
        fn new(clock: Arc<dyn Clock>) -> Self {
            let hub = Arc::new(ChannelHub::new());
            let mut rx = HashMap::new();
            for channel in channels::STATE_LISTENERS.iter() {
                rx.insert(*channel, hub.provision(channel).unwrap());
            }

            let joystick = SimJoystick::default();
            let params = ExecParams {
                shot_arm_settle_s: 0.05,
                shot_fire_s: 0.05,
                ..ExecParams::default()
            };
            let dispatcher = Dispatcher::new(
                params,
                JoystickLayout::default(),
                hub,
                Box::new(joystick.clone()),
                Arc::new(SimPowerMonitor { voltage: 12.0 }),
                clock,
            );

            Self {
                joystick,
                rx,
                dispatcher,
            }
        }

        fn drain(&self, channel: &str) -> Vec<Command> {
            let mut cmds = Vec::new();
            while let Some(m) = self.rx[channel].try_receive() {
                cmds.push(m.command);
            }
            cmds
        }

        fn drain_all(&self) {
            for channel in channels::STATE_LISTENERS.iter() {
                self.drain(channel);
            }
        }
    }

    #[test]
    fn test_state_change_broadcast_first() {
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        rig.joystick.set_button(JoystickLayout::default().tail_up_button, true);

        rig.dispatcher.cycle(RobotState::Teleoperated, 0.0);
        assert_eq!(rig.dispatcher.state(), Some(RobotState::Teleoperated));

        for channel in channels::STATE_LISTENERS.iter() {
            let cmds = rig.drain(channel);
            assert_eq!(cmds[0], Command::RobotStateTeleoperated, "{}", channel);
        }

        // Announced only on change
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.02);
        assert_eq!(rig.drain(channels::TAIL), vec![Command::TailRaise]);
    }

    #[test]
    fn test_no_operator_commands_in_autonomous() {
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        rig.joystick.set_button(JoystickLayout::default().arm_far_button, true);

        rig.dispatcher.cycle(RobotState::Autonomous, 0.0);
        rig.dispatcher.cycle(RobotState::Autonomous, 0.02);

        assert_eq!(rig.drain(channels::ARM), vec![Command::RobotStateAutonomous]);
        assert_eq!(
            rig.drain(channels::DRIVE),
            vec![Command::RobotStateAutonomous, Command::SystemConstants]
        );
    }

    #[test]
    fn test_operator_mapping() {
        let layout = JoystickLayout::default();
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.0);
        rig.drain_all();

        // Curvature drive every cycle, throttle inverted
        rig.joystick.set_axis(layout.throttle_axis, -0.5);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.02);
        let msg = rig.rx[channels::DRIVE].try_receive().unwrap();
        assert_eq!(msg.command, Command::DrivetrainDriveCheezy);
        assert_eq!(msg.cheezy_drive().unwrap().throttle, 0.5);

        // Zero gyro only on the press
        rig.joystick.set_button(layout.zero_gyro_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.04);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.06);
        assert_eq!(
            rig.drain(channels::DRIVE),
            vec![
                Command::DrivetrainZeroGyro,
                Command::DrivetrainDriveCheezy,
                Command::DrivetrainDriveCheezy
            ]
        );
        rig.joystick.set_button(layout.zero_gyro_button, false);

        // Intake held then released
        rig.joystick.set_button(layout.intake_in_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.08);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.10);
        rig.joystick.set_button(layout.intake_in_button, false);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.12);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.14);
        assert_eq!(
            rig.drain(channels::ARM),
            vec![Command::ArmIntake, Command::ArmIntake, Command::ArmIntakeStop]
        );

        // Both tail buttons cancel out
        rig.joystick.set_button(layout.tail_up_button, true);
        rig.joystick.set_button(layout.tail_down_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.16);
        assert!(rig.drain(channels::TAIL).is_empty());
    }

    #[test]
    fn test_search_suspends_drive() {
        let layout = JoystickLayout::default();
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.0);
        rig.drain_all();

        rig.joystick.set_button(layout.search_on_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.02);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.04);
        assert_eq!(rig.drain(channels::DRIVE), vec![Command::AutonomousSearchGoal]);

        rig.joystick.set_button(layout.search_off_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.06);
        assert_eq!(
            rig.drain(channels::DRIVE),
            vec![Command::DrivetrainStop, Command::DrivetrainDriveCheezy]
        );

        // A search ends by itself at its timeout
        rig.joystick.set_button(layout.search_on_button, false);
        rig.joystick.set_button(layout.search_off_button, false);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.08);
        rig.joystick.set_button(layout.search_on_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.10);
        rig.drain_all();
        rig.dispatcher.cycle(RobotState::Teleoperated, 5.0);
        assert_eq!(rig.drain(channels::DRIVE), vec![Command::DrivetrainDriveCheezy]);
    }

    #[test]
    fn test_hang_creeps_forward() {
        let layout = JoystickLayout::default();
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.0);
        rig.drain_all();

        rig.joystick.set_button(layout.hang_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.02);
        assert_eq!(rig.drain(channels::HANGER), vec![Command::HangerHang]);
        let msg = rig.rx[channels::DRIVE].try_receive().unwrap();
        assert_eq!(msg.cheezy_drive().unwrap().throttle, 0.1);
    }

    #[test]
    fn test_battery_divider() {
        let mut rig = Rig::new(Arc::new(ManualClock::new(0.0)));
        for i in 0..101 {
            rig.dispatcher.cycle(RobotState::Disabled, i as f64 * 0.02);
        }
        let cmds = rig.drain(channels::DRIVE);
        assert_eq!(
            cmds.iter()
                .filter(|c| **c == Command::SystemConstants)
                .count(),
            3
        );
    }

    #[test]
    fn test_shot_sequence_ignores_repeats() {
        let layout = JoystickLayout::default();
        let mut rig = Rig::new(Arc::new(MonotonicClock::new()));
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.0);
        rig.drain_all();

        rig.joystick.set_button(layout.shoot_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.02);
        assert!(rig.dispatcher.is_shot_running());

        // Second press while running
        rig.joystick.set_button(layout.shoot_button, false);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.04);
        rig.joystick.set_button(layout.shoot_button, true);
        rig.dispatcher.cycle(RobotState::Teleoperated, 0.06);

        let start = Instant::now();
        while rig.dispatcher.is_shot_running() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!rig.dispatcher.is_shot_running());

        assert_eq!(
            rig.drain(channels::ARM),
            vec![Command::ArmClose, Command::ArmMoveAfterShoot]
        );
        assert_eq!(rig.drain(channels::SHOOTER), vec![Command::ShooterShoot]);
    }

    #[test]
    fn test_leaving_autonomous_pauses_before_subsystems_answer() {
        let hub = Arc::new(ChannelHub::new());
        let mut rx: HashMap<&str, ChannelReceiver> = channels::STATE_LISTENERS
            .iter()
            .map(|c| (*c, hub.provision(c).unwrap()))
            .collect();
        let reply = hub.provision(channels::AUTO_REPLY).unwrap();
        let drive_rx = rx.remove(channels::DRIVE).unwrap();

        let script_path = std::env::temp_dir().join(format!(
            "robot_dispatch_pause_{}.txt",
            std::process::id()
        ));
        std::fs::write(&script_path, "MMOVE 0.5 24 5\nEND").unwrap();

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let tm = Arc::new(TmStore::new());
        let control = SeqControl::new();
        let seq = Sequencer::new(
            AutoParams {
                script_path,
                ..AutoParams::default()
            },
            hub.clone(),
            reply,
            tm.clone(),
            clock.clone(),
            control.clone(),
        );
        let seq_handle = seq.spawn().unwrap();

        // Like the drivetrain, fail the pending round trip as soon as the state change arrives
        let got_move = Arc::new(AtomicBool::new(false));
        let drive = {
            let hub = hub.clone();
            let control = control.clone();
            let got_move = got_move.clone();
            thread::spawn(move || {
                let mut pending = None;
                let start = Instant::now();
                while start.elapsed() < Duration::from_secs(2) {
                    let msg = drive_rx.receive(Duration::from_millis(1));
                    match msg.command {
                        Command::DrivetrainMeasuredStraight => {
                            pending = msg.reply_to.clone();
                            got_move.store(true, Ordering::SeqCst);
                        }
                        Command::RobotStateTeleoperated => {
                            let paused = control.is_paused();
                            if let Some(reply) = pending.take() {
                                hub.send(&reply, &Message::response(Response::Error))
                                    .unwrap();
                            }
                            return paused;
                        }
                        _ => (),
                    }
                }
                false
            })
        };

        let mut dispatcher = Dispatcher::new(
            ExecParams::default(),
            JoystickLayout::default(),
            hub.clone(),
            Box::new(SimJoystick::default()),
            Arc::new(SimPowerMonitor { voltage: 12.0 }),
            clock.clone(),
        )
        .with_sequencer(control.clone());

        dispatcher.cycle(RobotState::Autonomous, 0.0);
        let start = Instant::now();
        while !got_move.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(got_move.load(Ordering::SeqCst));

        dispatcher.cycle(RobotState::Teleoperated, 1.0);
        assert!(drive.join().unwrap());

        // The error is put down to the pause, not to the script
        thread::sleep(Duration::from_millis(50));
        assert_eq!(control.state(), SeqState::Paused);
        assert_ne!(
            tm.snapshot().get("Auto Status").cloned(),
            Some(TmValue::String("EARLY DEATH!".into()))
        );

        control.shutdown();
        seq_handle.join().unwrap();
    }

    #[test]
    fn test_match_schedule() {
        let params = ExecParams::default();
        assert_eq!(scheduled_state(&params, 0.0), Some(RobotState::Disabled));
        assert_eq!(scheduled_state(&params, 1.0), Some(RobotState::Autonomous));
        assert_eq!(scheduled_state(&params, 15.9), Some(RobotState::Autonomous));
        assert_eq!(scheduled_state(&params, 16.0), Some(RobotState::Teleoperated));
        assert_eq!(scheduled_state(&params, 151.5), Some(RobotState::Disabled));
        assert_eq!(scheduled_state(&params, 152.0), None);
    }
}
