//! Swerve kinematics engine
//!
//! Stateless maths parameterised by the positions of the four modules
//! relative to the chassis centre. Maps chassis velocity to wheel states
//! (forward), wheel states and position deltas back to chassis motion
//! (inverse, least squares), and provides the per-module setpoint
//! conditioning steps (desaturation, discretization, rotation optimisation
//! and cosine scaling).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{MatrixMN, Vector2, VectorN, U3, U8};
use serde::{Deserialize, Serialize};

// Internal
use crate::swerve_mod::{WheelPosition, WheelState, NUM_MODULES};
use util::maths::{ang_dist_pi, wrap_pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Wheel speeds below this magnitude carry no usable direction information.
///
/// Units: meters/second
const SPEED_EPSILON_MS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A chassis velocity - the motion of the robot body expressed in the body
/// frame.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Velocity along the body X (forward) axis.
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Velocity along the body Y (left) axis.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Angular velocity about the body Z axis (anticlockwise positive).
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

/// An infinitesimal body-frame motion over one tick.
///
/// Ephemeral - recomputed every tick from wheel position deltas, never
/// stored.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct Twist {
    /// Change in position along the body X axis in meters
    pub dx_m: f64,

    /// Change in position along the body Y axis in meters
    pub dy_m: f64,

    /// Change in heading in radians
    pub dtheta_rad: f64,
}

/// The swerve kinematics, fixed at construction by the module offsets.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    /// Module positions relative to the chassis centre.
    ///
    /// Units: meters,
    /// Frame: body
    offsets_m: [Vector2<f64>; NUM_MODULES],

    /// Pseudo-inverse of the forward kinematics matrix, used for the
    /// least-squares inverse mappings.
    pinv: MatrixMN<f64, U3, U8>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChassisVelocity {
    /// A zero chassis velocity.
    pub fn zero() -> Self {
        ChassisVelocity::default()
    }

    /// Build a body-frame velocity from a field-frame one, given the current
    /// heading of the body in the field.
    pub fn from_field_relative(field: ChassisVelocity, heading_rad: f64) -> Self {
        let (sin_h, cos_h) = heading_rad.sin_cos();

        ChassisVelocity {
            vx_ms: field.vx_ms * cos_h + field.vy_ms * sin_h,
            vy_ms: -field.vx_ms * sin_h + field.vy_ms * cos_h,
            omega_rads: field.omega_rads,
        }
    }

    /// Determine if all components are finite.
    pub fn is_valid(&self) -> bool {
        self.vx_ms.is_finite() && self.vy_ms.is_finite() && self.omega_rads.is_finite()
    }
}

impl SwerveKinematics {
    /// Create the kinematics from the four module offsets.
    pub fn new(offsets_m: [Vector2<f64>; NUM_MODULES]) -> Self {
        // Forward matrix: each module contributes two rows,
        // [1 0 -y; 0 1 x], mapping (vx, vy, omega) onto the module's vector
        // velocity.
        let mut fwd = MatrixMN::<f64, U8, U3>::zeros();

        for (i, offset) in offsets_m.iter().enumerate() {
            fwd[(2 * i, 0)] = 1.0;
            fwd[(2 * i, 2)] = -offset[1];
            fwd[(2 * i + 1, 1)] = 1.0;
            fwd[(2 * i + 1, 2)] = offset[0];
        }

        // The forward matrix always has full column rank for a four wheel
        // layout, so the pseudo-inverse cannot fail.
        let pinv = fwd.pseudo_inverse(1e-10).unwrap();

        SwerveKinematics { offsets_m, pinv }
    }

    /// Get the module offsets this kinematics was built with.
    pub fn offsets_m(&self) -> &[Vector2<f64>; NUM_MODULES] {
        &self.offsets_m
    }

    /// Forward kinematics: chassis velocity to four wheel states.
    ///
    /// Wheels with no commanded motion get an angle of zero - callers that
    /// want to hold the current steer angle at zero speed must substitute it
    /// themselves (the kinematics is stateless).
    pub fn to_wheel_states(&self, velocity: &ChassisVelocity) -> [WheelState; NUM_MODULES] {
        let mut states = [WheelState::default(); NUM_MODULES];

        for (i, offset) in self.offsets_m.iter().enumerate() {
            // v_i = v + omega x r_i
            let vx = velocity.vx_ms - velocity.omega_rads * offset[1];
            let vy = velocity.vy_ms + velocity.omega_rads * offset[0];

            let speed = (vx * vx + vy * vy).sqrt();

            states[i] = WheelState {
                speed_ms: speed,
                angle_rad: if speed < SPEED_EPSILON_MS {
                    0.0
                } else {
                    vy.atan2(vx)
                },
            };
        }

        states
    }

    /// Inverse kinematics: four wheel states to the chassis velocity which
    /// best explains them (least squares).
    pub fn to_chassis_velocity(&self, states: &[WheelState; NUM_MODULES]) -> ChassisVelocity {
        let mut meas = VectorN::<f64, U8>::zeros();

        for (i, state) in states.iter().enumerate() {
            let (sin_a, cos_a) = state.angle_rad.sin_cos();
            meas[2 * i] = state.speed_ms * cos_a;
            meas[2 * i + 1] = state.speed_ms * sin_a;
        }

        let sol = &self.pinv * meas;

        ChassisVelocity {
            vx_ms: sol[0],
            vy_ms: sol[1],
            omega_rads: sol[2],
        }
    }

    /// Inverse odometry: four wheel position deltas to the body-frame twist
    /// which best explains them (least squares).
    pub fn to_twist(&self, deltas: &[WheelPosition; NUM_MODULES]) -> Twist {
        let mut meas = VectorN::<f64, U8>::zeros();

        for (i, delta) in deltas.iter().enumerate() {
            let (sin_a, cos_a) = delta.angle_rad.sin_cos();
            meas[2 * i] = delta.distance_m * cos_a;
            meas[2 * i + 1] = delta.distance_m * sin_a;
        }

        let sol = &self.pinv * meas;

        Twist {
            dx_m: sol[0],
            dy_m: sol[1],
            dtheta_rad: sol[2],
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Uniformly scale all wheel speeds so none exceeds the maximum.
///
/// Scaling is applied to all four wheels so the shape of the commanded
/// motion (the ratios between wheel speeds) is preserved. Returns `true` if
/// any scaling was applied.
pub fn desaturate(states: &mut [WheelState; NUM_MODULES], max_speed_ms: f64) -> bool {
    let max_attained = states
        .iter()
        .map(|s| s.speed_ms.abs())
        .fold(0f64, f64::max);

    if max_attained > max_speed_ms {
        let scale = max_speed_ms / max_attained;
        for state in states.iter_mut() {
            state.speed_ms *= scale;
        }
        true
    } else {
        false
    }
}

/// Correct a chassis velocity for the curvature error of commanding a
/// constant velocity over a finite tick.
///
/// The per-module conversion assumes an instantaneous velocity. Holding that
/// velocity for a whole tick while rotating makes the robot drift off the
/// intended arc, so the translation components are corrected by the
/// first-order coupling of omega into vx/vy (the logarithm of the pose delta
/// the uncorrected command would produce).
pub fn discretize(velocity: &ChassisVelocity, dt_s: f64) -> ChassisVelocity {
    if dt_s <= 0.0 {
        return *velocity;
    }

    let dtheta = velocity.omega_rads * dt_s;
    let half_dtheta = dtheta / 2.0;

    let cos_minus_one = dtheta.cos() - 1.0;
    let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
        // Second-order Taylor expansion around dtheta = 0
        1.0 - dtheta * dtheta / 12.0
    } else {
        -(half_dtheta * dtheta.sin()) / cos_minus_one
    };

    let dx = velocity.vx_ms * dt_s;
    let dy = velocity.vy_ms * dt_s;

    ChassisVelocity {
        vx_ms: (dx * half_theta_by_tan + dy * half_dtheta) / dt_s,
        vy_ms: (-dx * half_dtheta + dy * half_theta_by_tan) / dt_s,
        omega_rads: velocity.omega_rads,
    }
}

/// Minimise steering travel for a target wheel state.
///
/// If the shortest rotation from the current measured angle to the target
/// angle exceeds 90 degrees, the wheel is flipped by 180 degrees and the
/// speed negated instead - the wheel can spin either face forward.
pub fn optimize(target: WheelState, current_angle_rad: f64) -> WheelState {
    let error = ang_dist_pi(current_angle_rad, target.angle_rad);

    if error.abs() > std::f64::consts::FRAC_PI_2 {
        WheelState {
            speed_ms: -target.speed_ms,
            angle_rad: wrap_pi(target.angle_rad + std::f64::consts::PI),
        }
    } else {
        target
    }
}

/// Scale the commanded speed by the cosine of the remaining angle error.
///
/// A module still turning toward its setpoint contributes proportionally
/// less drive effort, reducing wheel scrub at high steering error.
pub fn cosine_scale(target: WheelState, current_angle_rad: f64) -> WheelState {
    let error = ang_dist_pi(current_angle_rad, target.angle_rad);

    WheelState {
        speed_ms: target.speed_ms * error.cos(),
        angle_rad: target.angle_rad,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    /// Square module layout with a 0.3 m half-track
    fn square_kinematics() -> SwerveKinematics {
        SwerveKinematics::new([
            Vector2::new(0.3, 0.3),
            Vector2::new(0.3, -0.3),
            Vector2::new(-0.3, 0.3),
            Vector2::new(-0.3, -0.3),
        ])
    }

    fn assert_velocity_eq(a: &ChassisVelocity, b: &ChassisVelocity, tol: f64) {
        assert!(
            (a.vx_ms - b.vx_ms).abs() < tol
                && (a.vy_ms - b.vy_ms).abs() < tol
                && (a.omega_rads - b.omega_rads).abs() < tol,
            "velocities differ: {:?} vs {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let kin = square_kinematics();

        let cases = [
            ChassisVelocity {
                vx_ms: 1.0,
                vy_ms: 0.0,
                omega_rads: 0.0,
            },
            ChassisVelocity {
                vx_ms: 0.5,
                vy_ms: -1.2,
                omega_rads: 0.8,
            },
            ChassisVelocity {
                vx_ms: -0.3,
                vy_ms: 0.1,
                omega_rads: -2.0,
            },
        ];

        for case in &cases {
            let states = kin.to_wheel_states(case);
            let recovered = kin.to_chassis_velocity(&states);
            assert_velocity_eq(case, &recovered, 1e-9);
        }
    }

    #[test]
    fn test_pure_forward_drive() {
        let kin = square_kinematics();

        let states = kin.to_wheel_states(&ChassisVelocity {
            vx_ms: 1.0,
            vy_ms: 0.0,
            omega_rads: 0.0,
        });

        for state in &states {
            assert!((state.speed_ms - 1.0).abs() < 1e-12);
            assert!(state.angle_rad.abs() < 1e-12);
        }
    }

    #[test]
    fn test_desaturation_invariant() {
        let kin = square_kinematics();

        // Fast spin while translating saturates the outer wheels
        let mut states = kin.to_wheel_states(&ChassisVelocity {
            vx_ms: 3.0,
            vy_ms: 0.0,
            omega_rads: 8.0,
        });
        let before = states.clone();

        let max_speed = 2.0;
        let limited = desaturate(&mut states, max_speed);
        assert!(limited);

        let max_after = states.iter().map(|s| s.speed_ms.abs()).fold(0f64, f64::max);
        assert!(max_after <= max_speed + 1e-12);

        // Ratios between wheels must be unchanged
        for i in 0..NUM_MODULES {
            for j in 0..NUM_MODULES {
                let ratio_before = before[i].speed_ms / before[j].speed_ms;
                let ratio_after = states[i].speed_ms / states[j].speed_ms;
                assert!((ratio_before - ratio_after).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_desaturation_noop_below_limit() {
        let mut states = [WheelState {
            speed_ms: 1.0,
            angle_rad: 0.0,
        }; NUM_MODULES];

        assert!(!desaturate(&mut states, 2.0));
        assert_eq!(states[0].speed_ms, 1.0);
    }

    #[test]
    fn test_twist_pure_rotation() {
        let kin = square_kinematics();

        // All wheels tangent to the circle through the modules, equal
        // distance: a pure rotation
        let r = (2f64 * 0.3 * 0.3).sqrt();
        let dtheta = 0.1;
        let arc = r * dtheta;

        let deltas = [
            WheelPosition {
                distance_m: arc,
                angle_rad: (0.3f64).atan2(-0.3) ,
            },
            WheelPosition {
                distance_m: arc,
                angle_rad: (0.3f64).atan2(0.3),
            },
            WheelPosition {
                distance_m: arc,
                angle_rad: (-0.3f64).atan2(-0.3),
            },
            WheelPosition {
                distance_m: arc,
                angle_rad: (-0.3f64).atan2(0.3),
            },
        ];

        let twist = kin.to_twist(&deltas);

        assert!(twist.dx_m.abs() < 1e-9);
        assert!(twist.dy_m.abs() < 1e-9);
        assert!((twist.dtheta_rad - dtheta).abs() < 1e-9);
    }

    #[test]
    fn test_optimize_no_flip_across_wrap() {
        // Module at 170 deg commanded to -170 deg: a 20 deg shortest path
        // crossing the wrap, so no flip and no sign change
        let target = WheelState {
            speed_ms: 1.0,
            angle_rad: -170f64.to_radians(),
        };

        let optimized = optimize(target, 170f64.to_radians());

        assert!((optimized.angle_rad - (-170f64.to_radians())).abs() < 1e-9);
        assert_eq!(optimized.speed_ms, 1.0);
    }

    #[test]
    fn test_optimize_flips_large_rotation() {
        // 135 deg of travel is over the 90 deg threshold: flip and negate
        let target = WheelState {
            speed_ms: 1.0,
            angle_rad: 135f64.to_radians(),
        };

        let optimized = optimize(target, 0.0);

        assert!((optimized.angle_rad - (-45f64.to_radians())).abs() < 1e-9);
        assert_eq!(optimized.speed_ms, -1.0);
    }

    #[test]
    fn test_cosine_scale() {
        let target = WheelState {
            speed_ms: 1.0,
            angle_rad: FRAC_PI_2,
        };

        // Wheel hasn't turned yet: no drive effort at 90 deg error
        let scaled = cosine_scale(target, 0.0);
        assert!(scaled.speed_ms.abs() < 1e-12);

        // Wheel on target: full effort
        let scaled = cosine_scale(target, FRAC_PI_2);
        assert!((scaled.speed_ms - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_discretize_straight_line_unchanged() {
        let v = ChassisVelocity {
            vx_ms: 1.5,
            vy_ms: -0.5,
            omega_rads: 0.0,
        };

        let d = discretize(&v, 0.02);
        assert_velocity_eq(&v, &d, 1e-12);
    }

    #[test]
    fn test_discretize_couples_rotation() {
        let v = ChassisVelocity {
            vx_ms: 1.0,
            vy_ms: 0.0,
            omega_rads: PI,
        };

        let d = discretize(&v, 0.02);

        // Rotation is preserved, translation picks up a small correction
        assert_eq!(d.omega_rads, v.omega_rads);
        assert!(d.vy_ms.abs() > 0.0);
        assert!((d.vx_ms - v.vx_ms).abs() < 0.1);
    }
}
