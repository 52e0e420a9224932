//! # Message envelope
//!
//! Every interaction between subsystems is a [`Message`]: a command tag, an optional reply channel
//! name and a payload whose shape is fixed by the command. The payload can only be read back
//! through the accessor matching the command's family, so a receiver can never interpret fields
//! that were not defined for the command it received.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod codec;
mod payload;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

pub use codec::{MESSAGE_SIZE, MAX_REPLY_NAME_LEN, PAYLOAD_SIZE};
pub use payload::*;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

/// Declares the command enumeration together with its wire tags and payload families, so the
/// three can never drift apart.
macro_rules! commands {
    ($($(#[$meta:meta])* $name:ident = $tag:literal => $kind:ident),* $(,)?) => {
        /// All commands understood by the robot's subsystems.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Command {
            $($(#[$meta])* $name = $tag),*
        }

        impl Command {
            /// Every command, in tag order.
            pub const ALL: &'static [Command] = &[$(Command::$name),*];

            /// Get the command for the given wire tag, or `None` if the tag is unknown.
            pub fn from_tag(tag: u16) -> Option<Self> {
                match tag {
                    $($tag => Some(Command::$name),)*
                    _ => None
                }
            }

            /// The payload family carried by this command.
            pub fn payload_kind(self) -> PayloadKind {
                match self {
                    $(Command::$name => PayloadKind::$kind),*
                }
            }
        }
    };
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

commands! {
    /// Received frame could not be understood.
    Unknown = 0 => None,
    /// Synthetic command produced when a receive times out with nothing pending.
    SystemMsgTimeout = 1 => None,
    SystemOk = 2 => None,
    SystemError = 3 => None,
    /// Supply voltage broadcast from the dispatcher.
    SystemConstants = 4 => System,

    RobotStateDisabled = 10 => None,
    RobotStateAutonomous = 11 => None,
    RobotStateTeleoperated = 12 => None,
    RobotStateTest = 13 => None,
    RobotStateUnknown = 14 => None,

    AutonomousResponseOk = 20 => None,
    AutonomousResponseError = 21 => None,
    AutonomousComplete = 22 => None,
    AutonomousSearchGoal = 23 => Autonomous,
    AutonomousSearchBall = 24 => Autonomous,
    AutonomousIntake = 25 => Autonomous,
    AutonomousThrowup = 26 => Autonomous,
    AutonomousShoot = 27 => Autonomous,
    AutonomousAim = 28 => Autonomous,

    DrivetrainDriveTank = 40 => TankDrive,
    DrivetrainAutoMove = 41 => TankDrive,
    DrivetrainDriveSplitArcade = 42 => SplitArcade,
    DrivetrainDriveCheezy = 43 => CheezyDrive,
    DrivetrainMeasuredStraight = 44 => Autonomous,
    DrivetrainStraight = 45 => Autonomous,
    DrivetrainTurn = 46 => Autonomous,
    DrivetrainStop = 47 => None,
    DrivetrainSetAngle = 48 => Autonomous,
    DrivetrainZeroGyro = 49 => None,
    DrivetrainRangeSense = 50 => Autonomous,

    ArmFar = 60 => None,
    ArmClose = 61 => None,
    ArmMoveIntake = 62 => None,
    ArmMoveRide = 63 => None,
    ArmMoveAfterShoot = 64 => None,
    ArmIntake = 65 => Arm,
    ArmIntakeStop = 66 => None,
    ArmIntakeOut = 67 => None,
    ArmEnable = 68 => None,

    ShooterShoot = 80 => None,
    ShooterJawOpen = 81 => None,
    ShooterJawClose = 82 => None,
    ShooterOpen = 83 => None,
    ShooterClose = 84 => None,

    TailRaise = 90 => None,
    TailLower = 91 => None,

    HangerHang = 100 => None,
}

/// The global state of the robot, owned by the top level loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotState {
    Disabled,
    Autonomous,
    Teleoperated,
    Test,
    Unknown,
}

/// Result of a round trip command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok,
    Error,
}

/// Errors associated with building or reading messages.
#[derive(Debug, Error, PartialEq)]
pub enum MessageError {
    #[error("Command {0:?} carries a {1:?} payload, not {2:?}")]
    PayloadMismatch(Command, PayloadKind, PayloadKind),

    #[error("Reply channel name {0:?} is longer than {max} bytes", max = MAX_REPLY_NAME_LEN)]
    ReplyNameTooLong(String),

    #[error("Frame is {0} bytes long, expected {size}", size = MESSAGE_SIZE)]
    InvalidFrameLength(usize),

    #[error("Frame contains an unknown command tag: {0}")]
    UnknownTag(u16),

    #[error("Frame reply name is not valid UTF-8")]
    InvalidReplyName,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A command sent between subsystems.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The command to execute
    pub command: Command,

    /// Name of the channel that a response should be sent to, if one is wanted
    pub reply_to: Option<String>,

    payload: Payload,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Command {
    /// If this command announces a robot state change return the new state.
    pub fn robot_state(self) -> Option<RobotState> {
        match self {
            Command::RobotStateDisabled => Some(RobotState::Disabled),
            Command::RobotStateAutonomous => Some(RobotState::Autonomous),
            Command::RobotStateTeleoperated => Some(RobotState::Teleoperated),
            Command::RobotStateTest => Some(RobotState::Test),
            Command::RobotStateUnknown => Some(RobotState::Unknown),
            _ => None,
        }
    }

    /// True if this is a state change announcement.
    pub fn is_state_change(self) -> bool {
        self.robot_state().is_some()
    }

    /// If this is a response to a round trip command return which one.
    pub fn response(self) -> Option<Response> {
        match self {
            Command::AutonomousResponseOk => Some(Response::Ok),
            Command::AutonomousResponseError => Some(Response::Error),
            _ => None,
        }
    }
}

impl RobotState {
    /// The command which announces this state.
    pub fn command(self) -> Command {
        match self {
            RobotState::Disabled => Command::RobotStateDisabled,
            RobotState::Autonomous => Command::RobotStateAutonomous,
            RobotState::Teleoperated => Command::RobotStateTeleoperated,
            RobotState::Test => Command::RobotStateTest,
            RobotState::Unknown => Command::RobotStateUnknown,
        }
    }

    /// True if the robot is in a state where actuators may move.
    pub fn is_enabled(self) -> bool {
        matches!(
            self,
            RobotState::Autonomous | RobotState::Teleoperated | RobotState::Test
        )
    }
}

impl Response {
    /// The command used to send this response.
    pub fn command(self) -> Command {
        match self {
            Response::Ok => Command::AutonomousResponseOk,
            Response::Error => Command::AutonomousResponseError,
        }
    }
}

impl Message {
    /// Create a new message, checking that the payload belongs to the command's family.
    pub fn new(command: Command, payload: Payload) -> Result<Self, MessageError> {
        if command.payload_kind() != payload.kind() {
            return Err(MessageError::PayloadMismatch(
                command,
                command.payload_kind(),
                payload.kind(),
            ));
        }

        Ok(Self {
            command,
            reply_to: None,
            payload,
        })
    }

    /// Create a message for a command which carries no payload.
    pub fn bare(command: Command) -> Result<Self, MessageError> {
        Self::new(command, Payload::None)
    }

    /// The synthetic message returned by a receive which timed out.
    pub fn timeout() -> Self {
        Self {
            command: Command::SystemMsgTimeout,
            reply_to: None,
            payload: Payload::None,
        }
    }

    /// The message delivered in place of a frame that could not be decoded.
    pub fn unknown() -> Self {
        Self {
            command: Command::Unknown,
            reply_to: None,
            payload: Payload::None,
        }
    }

    /// The state change announcement for the given state.
    pub fn state_change(state: RobotState) -> Self {
        Self {
            command: state.command(),
            reply_to: None,
            payload: Payload::None,
        }
    }

    /// A response to a round trip command.
    pub fn response(response: Response) -> Self {
        Self {
            command: response.command(),
            reply_to: None,
            payload: Payload::None,
        }
    }

    /// Set the channel a response should be sent to.
    pub fn with_reply_to(mut self, channel: &str) -> Self {
        self.reply_to = Some(channel.to_string());
        self
    }

    /// Borrow the raw payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn tank_drive(&self) -> Result<TankDriveParams, MessageError> {
        match self.payload {
            Payload::TankDrive(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::TankDrive)),
        }
    }

    pub fn cheezy_drive(&self) -> Result<CheezyDriveParams, MessageError> {
        match self.payload {
            Payload::CheezyDrive(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::CheezyDrive)),
        }
    }

    pub fn split_arcade(&self) -> Result<SplitArcadeParams, MessageError> {
        match self.payload {
            Payload::SplitArcade(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::SplitArcade)),
        }
    }

    pub fn autonomous(&self) -> Result<AutonomousParams, MessageError> {
        match self.payload {
            Payload::Autonomous(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::Autonomous)),
        }
    }

    pub fn arm(&self) -> Result<ArmParams, MessageError> {
        match self.payload {
            Payload::Arm(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::Arm)),
        }
    }

    pub fn system(&self) -> Result<SystemParams, MessageError> {
        match self.payload {
            Payload::System(p) => Ok(p),
            _ => Err(self.mismatch(PayloadKind::System)),
        }
    }

    fn mismatch(&self, wanted: PayloadKind) -> MessageError {
        MessageError::PayloadMismatch(self.command, self.command.payload_kind(), wanted)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_payload_shape_enforced() {
        let tank = TankDriveParams {
            left: 0.5,
            right: -0.5,
        };

        assert!(Message::new(Command::DrivetrainDriveTank, Payload::TankDrive(tank)).is_ok());
        assert_eq!(
            Message::new(Command::DrivetrainTurn, Payload::TankDrive(tank)),
            Err(MessageError::PayloadMismatch(
                Command::DrivetrainTurn,
                PayloadKind::Autonomous,
                PayloadKind::TankDrive
            ))
        );
        assert!(Message::bare(Command::DrivetrainTurn).is_err());
    }

    #[test]
    fn test_accessor_refuses_other_family() {
        let msg = Message::new(
            Command::DrivetrainTurn,
            Payload::Autonomous(AutonomousParams {
                turn_angle_deg: 90.0,
                timeout_s: 3.0,
                ..Default::default()
            }),
        )
        .unwrap();

        assert_eq!(msg.autonomous().unwrap().turn_angle_deg, 90.0);
        assert!(msg.tank_drive().is_err());
        assert!(msg.arm().is_err());
    }

    #[test]
    fn test_tags_are_unique() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_tag(*cmd as u16), Some(*cmd));
        }
        assert_eq!(Command::from_tag(9999), None);
    }

    #[test]
    fn test_state_commands() {
        for state in [
            RobotState::Disabled,
            RobotState::Autonomous,
            RobotState::Teleoperated,
            RobotState::Test,
            RobotState::Unknown,
        ]
        .iter()
        {
            let msg = Message::state_change(*state);
            assert!(msg.command.is_state_change());
            assert_eq!(msg.command.robot_state(), Some(*state));
        }
        assert!(!Command::DrivetrainStop.is_state_change());
        assert!(!RobotState::Unknown.is_enabled());
    }
}
