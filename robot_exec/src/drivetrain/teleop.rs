//! Operator drive shaping

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::FRAC_PI_2;

use comms_if::msg::{SplitArcadeParams, TankDriveParams};
use util::maths::{clamp, dead_band};

use super::Params;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Tank drive, with the sticks cubed for finer control near centre.
pub fn tank(p: &TankDriveParams) -> (f64, f64) {
    (
        clamp(p.left.powi(3), -1.0, 1.0),
        clamp(p.right.powi(3), -1.0, 1.0),
    )
}

/// Split arcade drive: throttle on one stick, wheel and spin on the other.
///
/// A spin demand turns on the spot. Otherwise the wheel slows the inside side by an amount which
/// grows with the sine of the wheel deflection.
pub fn split_arcade(p: &SplitArcadeParams, params: &Params) -> (f64, f64) {
    let mut throttle = dead_band(p.throttle, params.arcade_dead_band);
    let wheel = dead_band(p.wheel, params.arcade_dead_band);
    let spin = dead_band(p.spin, params.arcade_dead_band);

    if throttle != 0.0 {
        throttle = throttle.powi(params.arcade_throttle_exp);
    }

    if spin != 0.0 {
        return (
            spin * params.arcade_spin_scale,
            -spin * params.arcade_spin_scale,
        );
    }

    let scale = (FRAC_PI_2 * wheel.abs()).sin();

    let (left, right) = if wheel >= 0.0 {
        // Turning right, slow the right side
        (throttle, throttle - scale * wheel * throttle)
    } else {
        (throttle + scale * wheel * throttle, throttle)
    };

    (clamp(left, -1.0, 1.0), clamp(right, -1.0, 1.0))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
