//! Parameters structure for the drivetrain

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::cheezy::CheezyParams;
use crate::current_guard::CurrentLimit;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drivetrain.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----
    /// Units: inches
    pub wheel_diameter_in: f64,

    /// Encoder counts per wheel revolution.
    pub counts_per_rev: f64,

    /// Velocity demand sent for a unit demand in closed loop mode.
    ///
    /// Units: counts/second
    pub full_speed_counts_s: f64,

    /// Put the drive motors in brake mode rather than coast.
    pub brake_mode: bool,

    // ---- STRAIGHT DRIVING ----
    /// Heading correction per degree of heading error.
    pub recover_strength: f64,

    /// Largest correction term applied to either side.
    pub max_recover: f64,

    // ---- TURNING ----
    pub turn_k_p: f64,
    pub turn_k_i: f64,
    pub turn_k_d: f64,

    /// Heading errors are divided by this before being passed to the turn controller.
    ///
    /// Units: degrees
    pub turn_normalisation_deg: f64,

    /// Largest spin demand the turn controller may output.
    pub turn_max_output: f64,

    /// Units: degrees
    pub turn_tolerance_deg: f64,

    /// Units: degrees/second
    pub turn_rate_tolerance_deg_s: f64,

    // ---- SEARCHING ----
    /// Offsets with a smaller magnitude than this count as centred.
    pub search_dead_band: f64,

    /// Wheel power for a full scale offset.
    pub search_gain: f64,

    /// Length of each left/right pulse window.
    ///
    /// Units: seconds
    pub search_window_s: f64,

    /// How long the target must stay centred.
    ///
    /// Units: seconds
    pub search_settle_s: f64,

    // ---- RANGE SENSING ----
    /// Length of each left/right pulse window.
    ///
    /// Units: seconds
    pub range_window_s: f64,

    // ---- TELEOP ----
    pub arcade_dead_band: f64,

    /// Exponent applied to the arcade throttle.
    pub arcade_throttle_exp: i32,

    /// Wheel power per unit of spin demand.
    pub arcade_spin_scale: f64,

    // ---- PROTECTION ----
    pub current_limit: CurrentLimit,

    // ---- CHEEZY ----
    pub cheezy: CheezyParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Convert a distance into encoder counts.
    pub fn inches_to_counts(&self, distance_in: f64) -> f64 {
        distance_in / (std::f64::consts::PI * self.wheel_diameter_in) * self.counts_per_rev
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            wheel_diameter_in: 6.0,
            counts_per_rev: 1024.0,
            full_speed_counts_s: 2800.0,
            brake_mode: true,
            recover_strength: 0.09,
            max_recover: 0.35,
            turn_k_p: 0.3,
            turn_k_i: 0.0,
            turn_k_d: 0.05,
            turn_normalisation_deg: 60.0,
            turn_max_output: 0.5,
            turn_tolerance_deg: 2.0,
            turn_rate_tolerance_deg_s: 5.0,
            search_dead_band: 0.05,
            search_gain: 0.3,
            search_window_s: 0.5,
            search_settle_s: 0.25,
            range_window_s: 0.5,
            arcade_dead_band: 0.05,
            arcade_throttle_exp: 5,
            arcade_spin_scale: 0.5,
            current_limit: CurrentLimit {
                max_current_a: 60.0,
                max_time_s: 1.0,
            },
            cheezy: CheezyParams::default(),
        }
    }
}
