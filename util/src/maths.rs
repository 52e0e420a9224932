//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Clamp a value into `[-limit, limit]`.
pub fn abs_limit<T>(value: T, limit: T) -> T
where
    T: Float,
{
    clamp(value, -limit.abs(), limit.abs())
}

/// Zero a value whose magnitude is inside the dead band.
pub fn dead_band<T>(value: T, band: T) -> T
where
    T: Float,
{
    if value.abs() < band {
        T::zero()
    } else {
        value
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in degrees into the range [-180, 180).
pub fn wrap_deg_180<T>(angle_deg: T) -> T
where
    T: Float,
{
    let half_turn = T::from(180.0).unwrap_or_else(T::zero);
    let full_turn = half_turn + half_turn;

    rem_euclid(angle_deg + half_turn, full_turn) - half_turn
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_deg_180() {
        assert_eq!(wrap_deg_180(0f64), 0f64);
        assert_eq!(wrap_deg_180(190f64), -170f64);
        assert_eq!(wrap_deg_180(-190f64), 170f64);
        assert_eq!(wrap_deg_180(540f64), -180f64);
        assert_eq!(wrap_deg_180(-725f64), -5f64);
        assert_eq!(wrap_deg_180(179.5f64), 179.5f64);
    }

    #[test]
    fn test_limits() {
        assert_eq!(clamp(1.5f64, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-1.5f64, -1.0, 1.0), -1.0);
        assert_eq!(abs_limit(-0.7f64, 0.5), -0.5);
        assert_eq!(dead_band(0.04f64, 0.05), 0.0);
        assert_eq!(dead_band(-0.06f64, 0.05), -0.06);
        assert_eq!(lin_map((0f64, 10f64), (0f64, 1f64), 5f64), 0.5);
    }
}
