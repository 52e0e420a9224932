//! # Equipment capability interfaces
//!
//! The control core never talks to concrete devices. Motor controllers, gyros, cameras, switches,
//! solenoids and joysticks are reached only through these traits, so the core can run against real
//! hardware or a simulation unchanged.

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How a motor interprets its demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Demand is a fraction of supply voltage in [-1, 1]
    Power,

    /// Demand is a closed loop velocity in encoder counts per second
    Velocity,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A motor driven through a smart motor controller with an attached encoder.
///
/// Only one subsystem ever owns a given motor.
pub trait MotorOutput: Send {
    fn set_control_mode(&mut self, mode: ControlMode);

    /// Set the velocity or power demand, depending on the control mode.
    fn set(&mut self, value: f64);

    /// Encoder position.
    ///
    /// Units: counts
    fn position(&self) -> f64;

    /// Encoder velocity.
    ///
    /// Units: counts/second
    fn velocity(&self) -> f64;

    /// Units: amps
    fn supply_current(&self) -> f64;

    fn set_brake_mode(&mut self, brake: bool);

    fn enable(&mut self);

    /// Disable the output, the motor coasts or brakes and ignores demands until enabled.
    fn disable(&mut self);

    fn is_enabled(&self) -> bool;
}

/// A heading sensor (gyro).
///
/// Headings are positive clockwise. Reads are side-effect free and may happen from any thread.
pub trait AngleSensor: Send + Sync {
    /// Units: degrees
    fn heading_deg(&self) -> f64;

    /// Units: degrees/second
    fn rate_deg_s(&self) -> f64;

    fn zero(&self);

    /// Units: degrees
    fn set_heading(&self, heading_deg: f64);
}

/// A digital sensor such as a proximity switch.
pub trait BooleanSensor: Send + Sync {
    fn read(&self) -> bool;
}

/// A sensor reporting the signed offset of a target from the centre of view, in [-1, 1].
pub trait OffsetSensor: Send + Sync {
    /// `None` if no target is currently detected.
    fn try_get_offset(&self) -> Option<f64>;
}

/// An operator controller.
pub trait HumanInput: Send {
    fn axis(&self, id: u32) -> f64;

    fn button(&self, id: u32) -> bool;

    /// Point of view hat angle in degrees, or -1 when centred.
    fn pov(&self) -> i32;
}

/// A pneumatic solenoid.
pub trait SolenoidOutput: Send {
    fn set(&mut self, on: bool);

    fn get(&self) -> bool;
}

/// Reports the robot's supply voltage.
pub trait PowerMonitor: Send + Sync {
    /// Units: volts
    fn supply_voltage(&self) -> f64;
}
