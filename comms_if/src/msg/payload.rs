//! # Message payload records

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Raw left/right demands, used by tank drive and autonomous open loop moves.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TankDriveParams {
    /// Left side demand in [-1, 1]
    pub left: f64,

    /// Right side demand in [-1, 1]
    pub right: f64,
}

/// Curvature drive demands from the operator.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CheezyDriveParams {
    /// Steering wheel in [-1, 1], positive to the right
    pub wheel: f64,

    /// Throttle in [-1, 1], positive forwards
    pub throttle: f64,

    /// Turn on the spot rather than following a curvature
    pub quickturn: bool,
}

/// Split arcade drive demands.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SplitArcadeParams {
    pub wheel: f64,
    pub throttle: f64,

    /// Spin in place demand, takes priority over wheel and throttle when non-zero
    pub spin: f64,
}

/// Parameters of an autonomous primitive. Which fields are meaningful depends on the command.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AutonomousParams {
    /// Autonomous mode number
    pub mode: u32,

    /// Start delay index
    pub delay: u32,

    /// Deadline for the primitive.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Minimum run time before the primitive may finish.
    ///
    /// Units: seconds
    pub timein_s: f64,

    /// Signed drive speed in [-1, 1]
    pub drive_speed: f64,

    /// Drive distance.
    ///
    /// Units: inches
    pub drive_distance_in: f64,

    /// Turn angle, positive clockwise.
    ///
    /// Units: degrees
    pub turn_angle_deg: f64,

    /// Duration of a timed drive.
    ///
    /// Units: seconds
    pub drive_time_s: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ArmParams {
    /// True to intake, false to eject
    pub direction: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SystemParams {
    /// Supply voltage.
    ///
    /// Units: volts
    pub battery_v: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Payload families, one per parameter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    None,
    TankDrive,
    CheezyDrive,
    SplitArcade,
    Autonomous,
    Arm,
    System,
}

/// The parameters carried by a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    None,
    TankDrive(TankDriveParams),
    CheezyDrive(CheezyDriveParams),
    SplitArcade(SplitArcadeParams),
    Autonomous(AutonomousParams),
    Arm(ArmParams),
    System(SystemParams),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::None => PayloadKind::None,
            Payload::TankDrive(_) => PayloadKind::TankDrive,
            Payload::CheezyDrive(_) => PayloadKind::CheezyDrive,
            Payload::SplitArcade(_) => PayloadKind::SplitArcade,
            Payload::Autonomous(_) => PayloadKind::Autonomous,
            Payload::Arm(_) => PayloadKind::Arm,
            Payload::System(_) => PayloadKind::System,
        }
    }
}
