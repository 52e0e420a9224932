//! # Shooter
//!
//! Two pneumatic stages: the jaw holding the ball against the arm, and the shooters which throw
//! it. A shot opens the jaw, then fires the shooters, then closes both, each stage held for a
//! fixed time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::sync::Arc;

// Internal
use super::{reply, ShooterParams};
use comms_if::{
    chan::ChannelHub,
    eqpt::SolenoidOutput,
    msg::{Command, Message, Response, RobotState},
    tm::Telemetry,
};
use util::module::Component;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ShooterHw {
    pub jaw: Box<dyn SolenoidOutput>,
    pub shooters: Box<dyn SolenoidOutput>,
}

pub struct Shooter {
    params: ShooterParams,
    hw: ShooterHw,
    hub: Arc<ChannelHub>,
    tm: Arc<dyn Telemetry>,

    enabled: bool,
    phase: Phase,

    /// Where to report the end of the current shot
    reply_to: Option<String>,

    clear_requested: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,

    /// Jaw open, shooters not yet fired. Ends at the given time.
    JawOpening(f64),

    /// Shooters open. Ends at the given time.
    Firing(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Shooter {
    pub fn new(
        params: ShooterParams,
        mut hw: ShooterHw,
        hub: Arc<ChannelHub>,
        tm: Arc<dyn Telemetry>,
    ) -> Self {
        hw.jaw.set(false);
        hw.shooters.set(false);

        Self {
            params,
            hw,
            hub,
            tm,
            enabled: false,
            phase: Phase::Idle,
            reply_to: None,
            clear_requested: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start a shot if possible, returning false if it was refused.
    fn start_shot(&mut self, msg: &Message, now_s: f64) -> bool {
        if !self.enabled {
            warn!("Shot refused while disabled");
            return false;
        }
        if self.phase != Phase::Idle {
            debug!("Shot refused, already shooting");
            return false;
        }

        info!("Shooting");
        self.hw.jaw.set(true);
        self.phase = Phase::JawOpening(now_s + self.params.jaw_open_s);
        self.reply_to = msg.reply_to.clone();
        true
    }

    /// Close everything and answer any waiting caller.
    fn end_shot(&mut self, rsp: Response) {
        self.hw.shooters.set(false);
        self.hw.jaw.set(false);

        if self.phase != Phase::Idle {
            debug!("Shot finished with {:?}", rsp);
            reply(&self.hub, self.reply_to.take().as_deref(), rsp);
            self.clear_requested = true;
        }
        self.phase = Phase::Idle;
    }

    fn handle(&mut self, msg: &Message, now_s: f64) {
        match msg.command {
            Command::ShooterShoot => {
                self.start_shot(msg, now_s);
            }
            Command::AutonomousShoot => {
                if !self.start_shot(msg, now_s) {
                    reply(&self.hub, msg.reply_to.as_deref(), Response::Error);
                }
            }
            Command::ShooterJawOpen if self.phase == Phase::Idle => self.hw.jaw.set(true),
            Command::ShooterJawClose if self.phase == Phase::Idle => self.hw.jaw.set(false),
            Command::ShooterOpen if self.phase == Phase::Idle => self.hw.shooters.set(true),
            Command::ShooterClose if self.phase == Phase::Idle => self.hw.shooters.set(false),
            Command::ShooterJawOpen
            | Command::ShooterJawClose
            | Command::ShooterOpen
            | Command::ShooterClose => debug!("Ignoring {:?} during a shot", msg.command),
            Command::AutonomousComplete => {
                if self.phase != Phase::Idle {
                    self.end_shot(Response::Error);
                }
            }
            Command::SystemMsgTimeout | Command::Unknown => (),
            c if c.is_state_change() => (),
            c => debug!("Shooter ignoring {:?}", c),
        }
    }

    fn step(&mut self, now_s: f64) {
        match self.phase {
            Phase::Idle => (),
            Phase::JawOpening(end_s) => {
                if now_s >= end_s {
                    self.hw.shooters.set(true);
                    self.phase = Phase::Firing(now_s + self.params.fire_s);
                }
            }
            Phase::Firing(end_s) => {
                if now_s >= end_s {
                    self.end_shot(Response::Ok);
                }
            }
        }
    }
}

impl Component for Shooter {
    fn name(&self) -> &str {
        "Shooter"
    }

    fn on_state_change(&mut self, state: RobotState, _now_s: f64) {
        if self.phase != Phase::Idle {
            warn!("Shot aborted by change to {:?}", state);
        }
        self.end_shot(Response::Error);
        self.enabled = state.is_enabled();
    }

    fn run(&mut self, msg: &Message, now_s: f64) {
        self.handle(msg, now_s);
        self.step(now_s);

        self.tm.put_bool("Jaw Open", self.hw.jaw.get());
        self.tm.put_bool("Shooters Open", self.hw.shooters.get());
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
    use crate::sim::SimSolenoid;
    use comms_if::chan::ChannelReceiver;
    use comms_if::msg::{AutonomousParams, Payload};
    use comms_if::tm::NullTelemetry;

    const DT: f64 = 0.02;

    struct Rig {
        jaw: SimSolenoid,
        shooters: SimSolenoid,
        reply: ChannelReceiver,
        shooter: Shooter,
        now_s: f64,
    }

    impl Rig {
        fn new(state: RobotState) -> Self {
            let jaw = SimSolenoid::default();
            let shooters = SimSolenoid::default();
            let hub = Arc::new(ChannelHub::new());
            let reply = hub.provision("reply").unwrap();

            let mut shooter = Shooter::new(
                ShooterParams::default(),
                ShooterHw {
                    jaw: Box::new(jaw.clone()),
                    shooters: Box::new(shooters.clone()),
                },
                hub,
                Arc::new(NullTelemetry),
            );
            shooter.on_state_change(state, 0.0);

            Self {
                jaw,
                shooters,
                reply,
                shooter,
                now_s: 0.0,
            }
        }

        fn cycle(&mut self, msg: &Message) {
            self.shooter.run(msg, self.now_s);
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

    fn auto_shoot() -> Message {
        Message::new(
            Command::AutonomousShoot,
            Payload::Autonomous(AutonomousParams::default()),
        )
        .unwrap()
        .with_reply_to("reply")
    }

    #[test]
    fn test_shot_sequence() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_shoot());
        assert!(rig.jaw.get());
        assert!(!rig.shooters.get());

        rig.idle_for(0.35);
        assert!(rig.jaw.get());
        assert!(rig.shooters.get());
        assert_eq!(rig.response(), None);

        rig.idle_for(0.35);
        assert!(!rig.jaw.get());
        assert!(!rig.shooters.get());
        assert_eq!(rig.response(), Some(Response::Ok));
        assert!(rig.shooter.take_clear_request());
    }

    #[test]
    fn test_refused_shots() {
        let mut rig = Rig::new(RobotState::Disabled);
        rig.cycle(&auto_shoot());
        assert_eq!(rig.response(), Some(Response::Error));
        assert!(!rig.jaw.get());

        let mut rig = Rig::new(RobotState::Teleoperated);
        rig.cycle(&Message::bare(Command::ShooterShoot).unwrap());
        rig.cycle(&auto_shoot());
        assert_eq!(rig.response(), Some(Response::Error));
        assert!(matches!(rig.shooter.phase(), Phase::JawOpening(_)));
    }

    #[test]
    fn test_state_change_aborts_shot() {
        let mut rig = Rig::new(RobotState::Autonomous);
        rig.cycle(&auto_shoot());
        rig.idle_for(0.35);

        rig.shooter.on_state_change(RobotState::Disabled, rig.now_s);
        assert_eq!(rig.response(), Some(Response::Error));
        assert!(!rig.jaw.get());
        assert!(!rig.shooters.get());
        assert_eq!(rig.shooter.phase(), Phase::Idle);
    }

    #[test]
    fn test_manual_solenoids() {
        let mut rig = Rig::new(RobotState::Teleoperated);
        rig.cycle(&Message::bare(Command::ShooterJawOpen).unwrap());
        assert!(rig.jaw.get());
        rig.cycle(&Message::bare(Command::ShooterOpen).unwrap());
        assert!(rig.shooters.get());
        rig.cycle(&Message::bare(Command::ShooterClose).unwrap());
        rig.cycle(&Message::bare(Command::ShooterJawClose).unwrap());
        assert!(!rig.jaw.get());
        assert!(!rig.shooters.get());
    }
}
