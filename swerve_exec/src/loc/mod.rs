//! # Localisation module
//!
//! This module provides the robot's authoritative field pose, fusing wheel
//! odometry with the gyro heading and asynchronous external pose
//! corrections. The pose estimate is the single source of truth for "where
//! is the robot" - no other component may cache or derive a competing pose.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod pose_est;

pub use params::LocParams;
pub use pose_est::PoseEst;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::kinematics::Twist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and heading in the field frame) of the robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in the field frame.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// The heading (angle to the positive field X axis, anticlockwise
    /// positive).
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// An externally supplied, timestamped estimate of the robot's field pose.
///
/// Produced by the vision/localisation collaborator; timestamps from a single
/// source are monotonically non-decreasing.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct PoseCorrection {
    /// The measured pose
    pub pose: Pose,

    /// Monotonic time at which the measurement was taken.
    ///
    /// Units: seconds
    pub time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose from position components and heading.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Pose {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// Euclidean distance between this pose's position and another's,
    /// ignoring orientation.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.position_m - other.position_m).norm()
    }

    /// Integrate a body-frame twist into this pose (the pose exponential).
    ///
    /// The twist is applied as a constant-curvature arc in the body frame,
    /// then rotated into the field frame by the current heading, so rotation
    /// during the tick is accounted for rather than assuming a straight-line
    /// step.
    pub fn exp(&self, twist: &Twist) -> Pose {
        let dtheta = twist.dtheta_rad;
        let sin_th = dtheta.sin();
        let cos_th = dtheta.cos();

        // First-order terms of the arc, with a Taylor expansion near zero
        // rotation to avoid the 0/0
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_th / dtheta, (1.0 - cos_th) / dtheta)
        };

        // Translation over the arc, in the body frame at the start of the
        // tick
        let tx = twist.dx_m * s - twist.dy_m * c;
        let ty = twist.dx_m * c + twist.dy_m * s;

        // Rotate into the field frame
        let (sin_h, cos_h) = self.heading_rad.sin_cos();

        Pose {
            position_m: self.position_m + Vector2::new(tx * cos_h - ty * sin_h, tx * sin_h + ty * cos_h),
            heading_rad: self.heading_rad + dtheta,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_exp_straight_line() {
        let pose = Pose::new(1.0, 2.0, FRAC_PI_2);

        // A forward step in the body frame becomes +y in the field frame
        // when heading is 90 deg
        let next = pose.exp(&Twist {
            dx_m: 0.5,
            dy_m: 0.0,
            dtheta_rad: 0.0,
        });

        assert!((next.position_m[0] - 1.0).abs() < 1e-9);
        assert!((next.position_m[1] - 2.5).abs() < 1e-9);
        assert!((next.heading_rad - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_exp_quarter_arc() {
        let pose = Pose::new(0.0, 0.0, 0.0);

        // Drive forward while turning through 90 deg: end of a quarter
        // circle of radius dx/dtheta
        let next = pose.exp(&Twist {
            dx_m: FRAC_PI_2,
            dy_m: 0.0,
            dtheta_rad: FRAC_PI_2,
        });

        // Radius is 1, so the arc ends at (1, 1)
        assert!((next.position_m[0] - 1.0).abs() < 1e-9);
        assert!((next.position_m[1] - 1.0).abs() < 1e-9);
        assert!((next.heading_rad - FRAC_PI_2).abs() < 1e-12);
    }
}
