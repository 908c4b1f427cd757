//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between a minimum and maximum.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float,
{
    let pi = T::from(std::f64::consts::PI).unwrap();
    let tau = T::from(std::f64::consts::TAU).unwrap();

    let mut wrapped = rem_euclid(angle + pi, tau) - pi;

    // rem_euclid can return exactly tau for negative inputs a round-off below
    // a multiple of tau, which would put us at +pi.
    if wrapped >= pi {
        wrapped = wrapped - tau;
    }

    wrapped
}

/// Get the signed shortest angular distance from `a` to `b`.
///
/// The result is in the range [-pi, pi), positive if the shortest rotation
/// from `a` to `b` is anticlockwise.
pub fn ang_dist_pi<T>(a: T, b: T) -> T
where
    T: Float,
{
    wrap_pi(b - a)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() {
        r + rhs.abs()
    } else {
        r
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0f64)).abs() < 1e-12);
        assert!((wrap_pi(PI) - (-PI)).abs() < 1e-12);
        assert!((wrap_pi(-PI) - (-PI)).abs() < 1e-12);
        assert!((wrap_pi(3.0 * PI) - (-PI)).abs() < 1e-12);
        assert!((wrap_pi(PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(2.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap_pi(-2.5 * PI) + 0.5 * PI).abs() < 1e-12);
    }

    #[test]
    fn test_ang_dist_pi() {
        // Crossing the wrap should give a short distance, not ~2pi
        let a = 179f64.to_radians();
        let b = -179f64.to_radians();
        assert!((ang_dist_pi(a, b) - 2f64.to_radians()).abs() < 1e-9);
        assert!((ang_dist_pi(b, a) + 2f64.to_radians()).abs() < 1e-9);

        assert!((ang_dist_pi(1f64, 2f64) - 1f64).abs() < 1e-12);
        assert!((ang_dist_pi(2f64, 1f64) + 1f64).abs() < 1e-12);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&2f64, &0f64, &1f64), 1f64);
        assert_eq!(clamp(&-2f64, &0f64, &1f64), 0f64);
        assert_eq!(clamp(&0.5f64, &0f64, &1f64), 0.5f64);
    }
}
