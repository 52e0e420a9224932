//! Parameters structure for the mechanisms
//!
//! One record per mechanism. Different builds of the same mechanism are presets of these records
//! in `mechanisms.toml`, not separate implementations.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::current_guard::CurrentLimit;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MechParams {
    pub arm: ArmParams,
    pub shooter: ShooterParams,
    pub hanger: HangerParams,
    pub tail: TailParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArmParams {
    // ---- LEVER ----
    /// Units: counts
    pub far_pos: f64,

    /// Units: counts
    pub close_pos: f64,

    /// Units: counts
    pub intake_pos: f64,

    /// Units: counts
    pub ride_pos: f64,

    /// Units: counts
    pub after_shoot_pos: f64,

    pub lever_k_p: f64,
    pub lever_k_i: f64,
    pub lever_k_d: f64,

    /// Largest power the lever controller may demand.
    pub lever_max_output: f64,

    pub lever_current_limit: CurrentLimit,

    // ---- ROLLERS ----
    pub intake_in_speed: f64,
    pub intake_out_speed: f64,
    pub intake_idle_speed: f64,

    /// Roller current indicating a ball has been taken in.
    ///
    /// Units: amps
    pub intake_current_threshold_a: f64,

    /// How long the rollers run out for a throw-up.
    ///
    /// Units: seconds
    pub throwup_s: f64,

    /// How long the lever is given to reach the aiming position.
    ///
    /// Units: seconds
    pub aim_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShooterParams {
    /// Time between opening the jaw and firing.
    ///
    /// Units: seconds
    pub jaw_open_s: f64,

    /// Time the shooters are held open.
    ///
    /// Units: seconds
    pub fire_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HangerParams {
    /// Motor demand while pulling the release pin.
    pub pullout_speed: f64,

    /// Motor demand while raising the robot.
    pub raise_speed: f64,

    /// How long the motor pulls the pin.
    ///
    /// Units: seconds
    pub pinout_s: f64,

    /// Time for the hook to deploy before raising is allowed.
    ///
    /// Units: seconds
    pub air_time_s: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TailParams {
    pub raise_power: f64,
    pub lower_power: f64,

    /// Power held when not commanded.
    pub idle_power: f64,

    /// How long a teleop command keeps the tail moving, they arrive every cycle while held.
    ///
    /// Units: seconds
    pub hold_s: f64,

    /// How long a single autonomous command keeps the tail moving.
    ///
    /// Units: seconds
    pub auto_motor_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ArmParams {
    fn default() -> Self {
        Self {
            far_pos: 1024.0,
            close_pos: 700.0,
            intake_pos: -100.0,
            ride_pos: 0.0,
            after_shoot_pos: 300.0,
            lever_k_p: 0.001,
            lever_k_i: 0.0,
            lever_k_d: 0.0,
            lever_max_output: 1.0,
            lever_current_limit: CurrentLimit {
                max_current_a: 30.0,
                max_time_s: 2.0,
            },
            intake_in_speed: 0.5,
            intake_out_speed: -1.0,
            intake_idle_speed: 0.1,
            intake_current_threshold_a: 15.0,
            throwup_s: 1.0,
            aim_s: 1.0,
        }
    }
}

impl Default for ShooterParams {
    fn default() -> Self {
        Self {
            jaw_open_s: 0.3,
            fire_s: 0.3,
        }
    }
}

impl Default for HangerParams {
    fn default() -> Self {
        Self {
            pullout_speed: 1.0,
            raise_speed: 1.0,
            pinout_s: 0.1,
            air_time_s: 1.5,
        }
    }
}

impl Default for TailParams {
    fn default() -> Self {
        Self {
            raise_power: 0.5,
            lower_power: 0.5,
            idle_power: 0.0,
            hold_s: 0.1,
            auto_motor_s: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_param_file_parses() {
        let params: MechParams =
            util::params::parse(include_str!("../../../params/mechanisms.toml")).unwrap();
        assert_eq!(params.arm.far_pos, ArmParams::default().far_pos);
        assert_eq!(params.arm.lever_current_limit.max_current_a, 30.0);
        assert_eq!(params.tail.auto_motor_s, 2.0);
    }
}
