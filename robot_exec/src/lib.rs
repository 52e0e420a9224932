//! # Robot library.
//!
//! This library allows the robot executable, and any test harness, to access the subsystems defined
//! inside the robot crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Autonomous - script sequencer and its state change handling
pub mod auto;

/// Current guard - disables a motor held above its current limit
pub mod current_guard;

/// Dispatcher - announces state changes and maps operator input to commands
pub mod dispatcher;

/// Drivetrain - drive modes, motion primitives and the cheezy filter
pub mod drivetrain;

/// Mechanisms - arm, shooter, hanger and tail
pub mod mech;

/// Executable and operator controller parameters
pub mod params;

pub mod pid;

/// Simulated plant and devices standing in for the hardware off-robot
pub mod sim;

pub mod telemetry;

/// Names of the channels each subsystem owns.
pub mod channels {
    pub const DRIVE: &str = "drive";
    pub const AUTO: &str = "auto";

    /// Replies to the sequencer's round trips
    pub const AUTO_REPLY: &str = "auto_reply";

    pub const ARM: &str = "arm";
    pub const SHOOTER: &str = "shooter";
    pub const HANGER: &str = "hanger";
    pub const TAIL: &str = "tail";

    /// Subsystems the sequencer commands.
    pub const SUBSYSTEMS: &[&str] = &[DRIVE, ARM, SHOOTER, HANGER, TAIL];

    /// Every channel told about robot state changes.
    pub const STATE_LISTENERS: &[&str] = &[DRIVE, AUTO, ARM, SHOOTER, HANGER, TAIL];
}
