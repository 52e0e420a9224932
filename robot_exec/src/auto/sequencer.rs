//! # Autonomous sequencer
//!
//! Runs the autonomous script on its own thread. Each entry into autonomous starts a new run: the
//! script is reloaded from disk and executed from the first line. Leaving autonomous pauses the
//! run, which then blocks between statements (and inside DELAY) until either autonomous is
//! entered again, starting a fresh run, or the sequencer is shut down.
//!
//! Statements either send a one-way command to a subsystem or make a round trip, sending the
//! command and blocking until the subsystem answers. An error answer, a bad parameter or an
//! unknown word halts the run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

// Internal
use super::{
    token::{match_token, number, number_or, ParamError, Token},
    Params,
};
use crate::channels;
use comms_if::{
    chan::{ChanError, ChannelHub, ChannelReceiver},
    msg::{
        AutonomousParams, Command, Message, MessageError, Payload, Response, TankDriveParams,
    },
    tm::Telemetry,
};
use util::{
    script::{Line, Script},
    time::Clock,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shared handle used to start, pause and observe the sequencer.
#[derive(Clone, Default)]
pub struct SeqControl {
    inner: Arc<(Mutex<SeqFlags>, Condvar)>,
}

#[derive(Debug)]
struct SeqFlags {
    paused: bool,

    /// Incremented on every entry into autonomous, identifies the current run
    generation: u64,

    state: SeqState,
    shutdown: bool,
}

pub struct Sequencer {
    params: Params,
    hub: Arc<ChannelHub>,
    reply: ChannelReceiver,
    tm: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
    control: SeqControl,

    /// When START was last executed
    script_start_s: f64,

    /// Value of the last MODE statement
    mode: u32,

    /// Value of the last DEBUG statement, non-zero logs every statement
    debug_level: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqState {
    NotRunning,
    Running,
    Paused,
    Faulted,
}

#[derive(Debug, Error)]
pub enum SeqError {
    #[error("{0}")]
    ParamError(ParamError),

    #[error("Unknown command word {0:?}")]
    UnknownToken(String),

    #[error("{1:?} answered with an error by {0}")]
    Rejected(&'static str, Command),

    #[error("Channel error: {0}")]
    ChanError(ChanError),

    #[error("Could not build message: {0}")]
    MessageError(MessageError),

    #[error("Invalid {0}: {1}")]
    InvalidValue(&'static str, f64),

    #[error("The run was interrupted")]
    Interrupted,
}

/// What to do after a statement.
enum Flow {
    Continue,
    Complete,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SeqFlags {
    fn default() -> Self {
        Self {
            paused: true,
            generation: 0,
            state: SeqState::NotRunning,
            shutdown: false,
        }
    }
}

impl SeqControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SeqFlags> {
        match self.inner.0.lock() {
            Ok(f) => f,
            Err(p) => p.into_inner(),
        }
    }

    fn modify<F: FnOnce(&mut SeqFlags)>(&self, f: F) {
        f(&mut self.lock());
        self.inner.1.notify_all();
    }

    /// Start a new run from the first line.
    ///
    /// Does nothing if already in autonomous, so the dispatcher and the autonomous component may
    /// both report the same entry.
    pub fn enter_auto(&self) {
        self.modify(|f| {
            if f.paused {
                f.paused = false;
                f.generation += 1;
            }
        })
    }

    /// Pause the current run, if any.
    pub fn leave_auto(&self) {
        self.modify(|f| {
            f.paused = true;
            if f.state == SeqState::Running {
                f.state = SeqState::Paused;
            }
        })
    }

    /// Stop the sequencer thread, abandoning any run.
    pub fn shutdown(&self) {
        self.modify(|f| f.shutdown = true)
    }

    pub fn state(&self) -> SeqState {
        self.lock().state
    }

    pub fn set_state(&self, state: SeqState) {
        self.modify(|f| f.state = state)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// True if the run `generation` has been replaced or the sequencer shut down.
    pub fn is_interrupted(&self, generation: u64) -> bool {
        let f = self.lock();
        f.shutdown || f.generation != generation
    }

    /// Block until a run newer than `last_generation` should start, returning its generation.
    ///
    /// Returns `None` once the sequencer is shut down.
    pub fn wait_for_run(&self, last_generation: u64, poll: Duration) -> Option<u64> {
        let cvar = &self.inner.1;
        let mut flags = self.lock();

        loop {
            if flags.shutdown {
                return None;
            }
            if flags.generation != last_generation && !flags.paused {
                flags.state = SeqState::Running;
                return Some(flags.generation);
            }

            flags = match cvar.wait_timeout(flags, poll) {
                Ok((f, _)) => f,
                Err(p) => p.into_inner().0,
            };
        }
    }

    /// Block while the run `generation` is paused.
    ///
    /// Returns [`SeqError::Interrupted`] if the run is replaced or the sequencer shut down.
    pub fn wait_while_paused(&self, generation: u64, poll: Duration) -> Result<(), SeqError> {
        let cvar = &self.inner.1;
        let mut flags = self.lock();

        loop {
            if flags.shutdown || flags.generation != generation {
                return Err(SeqError::Interrupted);
            }
            if !flags.paused {
                return Ok(());
            }

            flags = match cvar.wait_timeout(flags, poll) {
                Ok((f, _)) => f,
                Err(p) => p.into_inner().0,
            };
        }
    }
}

impl Sequencer {
    pub fn new(
        params: Params,
        hub: Arc<ChannelHub>,
        reply: ChannelReceiver,
        tm: Arc<dyn Telemetry>,
        clock: Arc<dyn Clock>,
        control: SeqControl,
    ) -> Self {
        Self {
            params,
            hub,
            reply,
            tm,
            clock,
            control,
            script_start_s: 0.0,
            mode: 0,
            debug_level: 0,
        }
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Run the sequencer on its own thread until shut down.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("tAutoEx".into())
            .spawn(move || self.run_forever())
    }

    /// Execute a run for every entry into autonomous until shut down.
    pub fn run_forever(mut self) {
        let poll = Duration::from_secs_f64(self.params.pause_poll_s);
        // Generations start at zero, so an entry made before the thread started still runs
        let mut last_generation = 0;

        self.tm.put_string("Auto Status", "Ready to go");
        self.publish_state();

        while let Some(generation) = self.control.wait_for_run(last_generation, poll) {
            last_generation = generation;
            self.run_script(generation);
        }

        info!("Sequencer shut down");
    }

    /// Load the script and execute it from the first line as run `generation`.
    pub fn run_script(&mut self, generation: u64) {
        self.control.set_state(SeqState::Running);
        self.publish_state();

        let script = match Script::load(&self.params.script_path, self.params.max_script_lines) {
            Ok(s) => s,
            Err(e) => {
                error!("Could not load the autonomous script: {}", e);
                self.tm.put_bool("Script File Loaded", false);
                self.tm.put_string("Auto Status", "NO SCRIPT");
                self.control.set_state(SeqState::Faulted);
                self.publish_state();
                return;
            }
        };
        self.tm.put_bool("Script File Loaded", true);

        info!(
            "Running autonomous script {:?} ({} lines)",
            self.params.script_path,
            script.len()
        );
        self.script_start_s = self.clock.now_s();

        for idx in 0..script.len() {
            let tokens = match script.line(idx) {
                Some(Line::Tokens(t)) => t,
                _ => continue,
            };
            let text = script.text(idx).unwrap_or("");

            self.tm.put_number("Script Line Number", idx as f64);
            self.tm.put_string("Script Line", text);

            match self.execute(generation, idx, &tokens) {
                Ok(Flow::Continue) => (),
                Ok(Flow::Complete) => {
                    self.complete();
                    return;
                }
                Err(e) => {
                    self.halt(generation, idx, text, e);
                    return;
                }
            }
        }

        // Ran off the end without an END statement
        if let Err(e) = self.send_bare(channels::DRIVE, Command::DrivetrainStop) {
            warn!("Could not stop the drivetrain: {}", e);
        }
        self.complete();
    }

    fn complete(&mut self) {
        info!(
            "Autonomous script complete after {:.2} s",
            self.clock.now_s() - self.script_start_s
        );
        self.tm.put_string("Script Line", "<NOT RUNNING>");
        self.tm.put_string("Auto Status", "auto ok");
        self.control.set_state(SeqState::NotRunning);
        self.publish_state();
    }

    /// End the run after a failed statement.
    fn halt(&mut self, generation: u64, idx: usize, text: &str, err: SeqError) {
        // A failure caused by leaving autonomous leaves the run paused
        if matches!(err, SeqError::Interrupted)
            || self.control.is_paused()
            || self.control.is_interrupted(generation)
        {
            info!("Autonomous run interrupted at line {}", idx + 1);
            if !self.control.is_interrupted(generation) {
                self.broadcast_stop();
            }
            return;
        }

        error!("Autonomous script halted at line {} ({:?}): {}", idx + 1, text, err);
        self.tm.put_string("Script Line", "<NOT RUNNING>");
        self.tm.put_string("Auto Status", "EARLY DEATH!");

        self.broadcast_stop();
        self.control.set_state(SeqState::NotRunning);
        self.publish_state();
    }

    /// Stop everything the script may have left moving.
    fn broadcast_stop(&self) {
        let stops = [
            (channels::DRIVE, Command::DrivetrainStop),
            (channels::ARM, Command::AutonomousComplete),
            (channels::SHOOTER, Command::AutonomousComplete),
            (channels::HANGER, Command::AutonomousComplete),
            (channels::TAIL, Command::AutonomousComplete),
        ];

        for &(channel, cmd) in stops.iter() {
            if let Err(e) = self.send_bare(channel, cmd) {
                warn!("Could not stop {}: {}", channel, e);
            }
        }
    }

    fn publish_state(&self) {
        self.tm
            .put_string("Auto State", &format!("{:?}", self.control.state()));
    }

    /// Execute one statement.
    fn execute(
        &mut self,
        generation: u64,
        idx: usize,
        tokens: &[&str],
    ) -> Result<Flow, SeqError> {
        let word = match tokens.first() {
            Some(w) => *w,
            None => return Ok(Flow::Continue),
        };
        let token = match match_token(word) {
            Some(t) => t,
            None => return Err(SeqError::UnknownToken(word.to_string())),
        };
        let params = &tokens[1..];

        // Never start a statement while paused
        self.hold_while_paused(generation)?;

        if self.debug_level > 0 {
            info!(
                "{:.3} {:03}: {}",
                self.clock.now_s() - self.script_start_s,
                idx + 1,
                tokens.join(" ")
            );
        } else {
            debug!("{:03}: {}", idx + 1, tokens.join(" "));
        }

        let p = &self.params;

        match token {
            Token::Start => {
                self.script_start_s = self.clock.now_s();
                self.send_auto(
                    channels::DRIVE,
                    Command::DrivetrainSetAngle,
                    AutonomousParams::default(),
                )?;
            }
            Token::Finish => {
                for channel in channels::SUBSYSTEMS.iter() {
                    self.send_bare(channel, Command::AutonomousComplete)?;
                }
            }
            Token::Mode => {
                let mode = number(params, 0, "mode").map_err(SeqError::ParamError)?;
                self.mode = check_count("mode", mode)?;
                info!("Autonomous mode {}", self.mode);
            }
            Token::Debug => {
                let level = number(params, 0, "debug level").map_err(SeqError::ParamError)?;
                self.debug_level = check_count("debug level", level)?;
            }
            Token::Message => info!("{:03}: {}", idx + 1, params.join(" ")),
            Token::Begin => debug!("Script begins"),
            Token::End => {
                self.send_bare(channels::DRIVE, Command::AutonomousComplete)?;
                return Ok(Flow::Complete);
            }
            Token::Delay => {
                let delay_s = number(params, 0, "delay").map_err(SeqError::ParamError)?;
                self.delay(generation, delay_s)?;
            }
            Token::Move => {
                let left = number(params, 0, "left").map_err(SeqError::ParamError)?;
                let right = number(params, 1, "right").map_err(SeqError::ParamError)?;
                check_unit("left", left)?;
                check_unit("right", right)?;

                let msg = Message::new(
                    Command::DrivetrainAutoMove,
                    Payload::TankDrive(TankDriveParams { left, right }),
                )
                .map_err(SeqError::MessageError)?;
                self.send(channels::DRIVE, &msg)?;
            }
            Token::MMove => {
                let auto = AutonomousParams {
                    drive_speed: number(params, 0, "speed").map_err(SeqError::ParamError)?,
                    drive_distance_in: number(params, 1, "distance")
                        .map_err(SeqError::ParamError)?,
                    timeout_s: number_or(params, 2, "timeout", p.mmove_timeout_s)
                        .map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.round_trip(
                    generation,
                    channels::DRIVE,
                    Command::DrivetrainMeasuredStraight,
                    auto,
                )?;
            }
            Token::Turn => {
                let auto = AutonomousParams {
                    turn_angle_deg: number(params, 0, "angle").map_err(SeqError::ParamError)?,
                    timeout_s: number_or(params, 1, "timeout", p.turn_timeout_s)
                        .map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.round_trip(generation, channels::DRIVE, Command::DrivetrainTurn, auto)?;
            }
            Token::Straight => {
                let speed = number(params, 0, "speed").map_err(SeqError::ParamError)?;
                let duration_s = number(params, 1, "duration").map_err(SeqError::ParamError)?;
                check_unit("speed", speed)?;
                check_positive("duration", duration_s)?;

                let auto = AutonomousParams {
                    drive_speed: speed,
                    drive_time_s: duration_s,
                    ..AutonomousParams::default()
                };
                self.send_auto(channels::DRIVE, Command::DrivetrainStraight, auto)?;
            }
            Token::Search | Token::SearchBall => {
                let cmd = match token {
                    Token::Search => Command::AutonomousSearchGoal,
                    _ => Command::AutonomousSearchBall,
                };
                let auto = AutonomousParams {
                    timeout_s: number_or(params, 0, "timeout", p.search_timeout_s)
                        .map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.round_trip(generation, channels::DRIVE, cmd, auto)?;
            }
            Token::RedSense => {
                let auto = AutonomousParams {
                    drive_speed: number(params, 0, "speed").map_err(SeqError::ParamError)?,
                    timeout_s: number_or(params, 1, "timeout", p.range_timeout_s)
                        .map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.round_trip(
                    generation,
                    channels::DRIVE,
                    Command::DrivetrainRangeSense,
                    auto,
                )?;
            }
            Token::SetAngle => {
                let auto = AutonomousParams {
                    turn_angle_deg: number(params, 0, "angle").map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.send_auto(channels::DRIVE, Command::DrivetrainSetAngle, auto)?;
            }
            Token::Intake => {
                let auto = AutonomousParams {
                    timeout_s: number_or(params, 0, "timeout", p.intake_timeout_s)
                        .map_err(SeqError::ParamError)?,
                    ..AutonomousParams::default()
                };
                self.round_trip(generation, channels::ARM, Command::AutonomousIntake, auto)?;
            }
            Token::StopIntake => self.send_bare(channels::ARM, Command::ArmIntakeStop)?,
            Token::Ride => self.send_bare(channels::ARM, Command::ArmMoveRide)?,
            Token::Lowest | Token::Lower => self.send_bare(channels::ARM, Command::ArmMoveIntake)?,
            Token::AfterShoot => self.send_bare(channels::ARM, Command::ArmMoveAfterShoot)?,
            Token::Raise => self.send_bare(channels::ARM, Command::ArmFar)?,
            Token::Throwup => self.round_trip(
                generation,
                channels::ARM,
                Command::AutonomousThrowup,
                AutonomousParams::default(),
            )?,
            Token::Aim => self.round_trip(
                generation,
                channels::ARM,
                Command::AutonomousAim,
                AutonomousParams::default(),
            )?,
            Token::Shoot => self.round_trip(
                generation,
                channels::SHOOTER,
                Command::AutonomousShoot,
                AutonomousParams::default(),
            )?,
            Token::Short => {
                self.send_bare(channels::ARM, Command::ArmClose)?;
                self.round_trip(
                    generation,
                    channels::SHOOTER,
                    Command::AutonomousShoot,
                    AutonomousParams::default(),
                )?;
            }
            Token::TailDown => self.send_bare(channels::TAIL, Command::TailLower)?,
            Token::TailUp => self.send_bare(channels::TAIL, Command::TailRaise)?,
            Token::StartDriveFwd | Token::StartDriveBck => {
                let speed = number(params, 0, "speed").map_err(SeqError::ParamError)?;
                check_unit("speed", speed)?;
                let sign = match token {
                    Token::StartDriveFwd => 1.0,
                    _ => -1.0,
                };
                let auto = AutonomousParams {
                    drive_speed: sign * speed.abs(),
                    drive_time_s: p.drive_forever_s,
                    ..AutonomousParams::default()
                };
                self.send_auto(channels::DRIVE, Command::DrivetrainStraight, auto)?;
            }
            Token::StopDrive => self.send_bare(channels::DRIVE, Command::DrivetrainStop)?,
            Token::JawOpen => self.send_bare(channels::SHOOTER, Command::ShooterJawOpen)?,
            Token::JawClose => self.send_bare(channels::SHOOTER, Command::ShooterJawClose)?,
        }

        Ok(Flow::Continue)
    }

    fn pause_poll(&self) -> Duration {
        Duration::from_secs_f64(self.params.pause_poll_s)
    }

    /// Stop everything and block while the run is paused.
    fn hold_while_paused(&self, generation: u64) -> Result<(), SeqError> {
        if self.control.is_paused() && !self.control.is_interrupted(generation) {
            self.broadcast_stop();
        }
        self.control
            .wait_while_paused(generation, self.pause_poll())
    }

    /// Wait for `delay_s` of unpaused time.
    fn delay(&self, generation: u64, delay_s: f64) -> Result<(), SeqError> {
        let mut remaining_s = delay_s;
        let mut last_s = self.clock.now_s();

        while remaining_s > 0.0 {
            if self.control.is_paused() {
                self.hold_while_paused(generation)?;
                // Time spent paused does not count
                last_s = self.clock.now_s();
            }

            self.clock.sleep(self.params.delay_step_s.min(remaining_s));

            if self.control.is_interrupted(generation) {
                return Err(SeqError::Interrupted);
            }

            let now_s = self.clock.now_s();
            if !self.control.is_paused() {
                remaining_s -= now_s - last_s;
            }
            last_s = now_s;
        }

        Ok(())
    }

    fn send(&self, channel: &str, msg: &Message) -> Result<(), SeqError> {
        self.hub.send(channel, msg).map_err(SeqError::ChanError)
    }

    fn send_bare(&self, channel: &str, cmd: Command) -> Result<(), SeqError> {
        let msg = Message::bare(cmd).map_err(SeqError::MessageError)?;
        self.send(channel, &msg)
    }

    fn send_auto(
        &self,
        channel: &str,
        cmd: Command,
        auto: AutonomousParams,
    ) -> Result<(), SeqError> {
        let msg = Message::new(cmd, Payload::Autonomous(auto)).map_err(SeqError::MessageError)?;
        self.send(channel, &msg)
    }

    /// Send a command and block until the subsystem answers.
    fn round_trip(
        &self,
        generation: u64,
        channel: &'static str,
        cmd: Command,
        auto: AutonomousParams,
    ) -> Result<(), SeqError> {
        let msg = Message::new(cmd, Payload::Autonomous(auto)).map_err(SeqError::MessageError)?;
        let control = self.control.clone();

        let rsp = self.hub.send_with_response(
            channel,
            msg,
            &self.reply,
            Duration::from_secs_f64(self.params.response_poll_s),
            || control.is_interrupted(generation),
        );

        match rsp {
            Ok(Response::Ok) => {
                debug!("{:?} completed by {}", cmd, channel);
                self.tm.put_string("Auto Status", "auto ok");
                Ok(())
            }
            Ok(Response::Error) => Err(SeqError::Rejected(channel, cmd)),
            Err(ChanError::Abandoned(_)) => Err(SeqError::Interrupted),
            Err(e) => Err(SeqError::ChanError(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn check_unit(name: &'static str, value: f64) -> Result<(), SeqError> {
    match value.abs() <= 1.0 {
        true => Ok(()),
        false => Err(SeqError::InvalidValue(name, value)),
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), SeqError> {
    match value > 0.0 {
        true => Ok(()),
        false => Err(SeqError::InvalidValue(name, value)),
    }
}

/// A whole, non-negative number small enough for a `u32`.
fn check_count(name: &'static str, value: f64) -> Result<u32, SeqError> {
    match value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        true => Ok(value as u32),
        false => Err(SeqError::InvalidValue(name, value)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
