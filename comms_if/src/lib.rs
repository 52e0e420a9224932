//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the robot software: the message envelope
//! passed between subsystems, the named channels that carry it, and the capabilities the control
//! core expects from hardware and telemetry.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message envelope, payload records and the fixed-size wire codec
pub mod msg;

/// Named one-way channels between subsystems
pub mod chan;

/// Capability interfaces for equipment (motors, sensors, operator input)
pub mod eqpt;

/// Telemetry sink interface
pub mod tm;
