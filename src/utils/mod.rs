//! Utilities
pub mod linalg;
pub mod ode;
pub mod stats;

use std::f64::consts::PI;

/// Wrap an angle (radians) into the interval `[-π, π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_identity_in_range() {
        assert!((wrap_angle(1.0) - 1.0).abs() < 1e-12);
        assert!((wrap_angle(-3.0) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn wrap_angle_full_turns() {
        assert!((wrap_angle(1.0 + 4.0 * PI) - 1.0).abs() < 1e-9);
        assert!((wrap_angle(-1.0 - 2.0 * PI) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn wrap_angle_pi_maps_to_negative_pi() {
        assert!((wrap_angle(PI) + PI).abs() < 1e-12);
    }
}
