//! # Robot Executable Parameters
//!
//! This module provides parameters for the robot executable and the operator controller layout.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::sim::SimPlantParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    /// Target period of one dispatcher cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Longest a subsystem waits for a message before running a timeout cycle.
    ///
    /// Units: seconds
    pub recv_timeout_s: f64,

    /// Time spent disabled before the match starts.
    ///
    /// Units: seconds
    pub pre_match_s: f64,

    /// Units: seconds
    pub autonomous_s: f64,

    /// Units: seconds
    pub teleop_s: f64,

    /// Number of dispatcher cycles between supply voltage updates to the drivetrain.
    pub battery_divider: u64,

    /// Units: seconds
    pub tm_period_s: f64,

    /// Timeout of an operator requested goal search.
    ///
    /// Units: seconds
    pub teleop_search_timeout_s: f64,

    /// Throttle applied while the hang button is held.
    pub hang_creep_throttle: f64,

    /// Time between closing the arm and shooting in the shot sequence.
    ///
    /// Units: seconds
    pub shot_arm_settle_s: f64,

    /// Time between shooting and moving the arm clear in the shot sequence.
    ///
    /// Units: seconds
    pub shot_fire_s: f64,

    pub sim: SimParams,
}

/// Layout of the simulated world the exec runs against off-robot.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    pub plant: SimPlantParams,

    /// Bearing of the goal from the starting heading.
    ///
    /// Units: degrees
    pub goal_bearing_deg: f64,

    /// Units: degrees
    pub ball_bearing_deg: f64,

    /// Units: degrees
    pub camera_half_fov_deg: f64,

    /// Units: volts
    pub battery_v: f64,
}

/// Axis and button numbers of the operator controller.
#[derive(Debug, Clone, Deserialize)]
pub struct JoystickLayout {
    pub wheel_axis: u32,
    pub throttle_axis: u32,

    /// Pushing the stick forward gives a negative reading on most controllers.
    pub invert_throttle: bool,

    pub quickturn_button: u32,
    pub zero_gyro_button: u32,
    pub search_on_button: u32,
    pub search_off_button: u32,

    pub arm_enable_button: u32,
    pub arm_far_button: u32,
    pub arm_close_button: u32,
    pub arm_intake_pos_button: u32,
    pub arm_ride_button: u32,

    pub intake_in_button: u32,
    pub intake_out_button: u32,

    pub tail_up_button: u32,
    pub tail_down_button: u32,

    pub shoot_button: u32,
    pub hang_button: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.02,
            recv_timeout_s: 0.05,
            pre_match_s: 1.0,
            autonomous_s: 15.0,
            teleop_s: 135.0,
            battery_divider: 50,
            tm_period_s: 0.5,
            teleop_search_timeout_s: 4.0,
            hang_creep_throttle: 0.1,
            shot_arm_settle_s: 0.5,
            shot_fire_s: 1.0,
            sim: SimParams::default(),
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            plant: SimPlantParams::default(),
            goal_bearing_deg: 30.0,
            ball_bearing_deg: -20.0,
            camera_half_fov_deg: 35.0,
            battery_v: 12.5,
        }
    }
}

impl Default for JoystickLayout {
    fn default() -> Self {
        Self {
            wheel_axis: 4,
            throttle_axis: 2,
            invert_throttle: true,
            quickturn_button: 6,
            zero_gyro_button: 7,
            search_on_button: 8,
            search_off_button: 10,
            arm_enable_button: 9,
            arm_far_button: 4,
            arm_close_button: 2,
            arm_intake_pos_button: 1,
            arm_ride_button: 3,
            intake_in_button: 5,
            intake_out_button: 11,
            tail_up_button: 12,
            tail_down_button: 13,
            shoot_button: 14,
            hang_button: 15,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_param_files_parse() {
        let exec: ExecParams =
            util::params::parse(include_str!("../../params/robot_exec.toml")).unwrap();
        assert_eq!(exec.battery_divider, 50);
        assert_eq!(exec.sim.plant.full_speed_counts_s, 2800.0);

        let layout: JoystickLayout =
            util::params::parse(include_str!("../../params/joystick.toml")).unwrap();
        assert!(layout.invert_throttle);
        assert_ne!(layout.shoot_button, layout.hang_button);
    }
}
