//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::swerve_mod::NUM_MODULES;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----

    /// The position of each module relative to the chassis centre, as
    /// (x, y) with x forward and y left. Indices are fixed: FL, FR, BL, BR.
    ///
    /// Units: meters,
    /// Frame: body
    pub module_offsets_m: [[f64; 2]; NUM_MODULES],

    // ---- CAPABILITIES ----

    /// Maximum linear wheel speed. Setpoints above this are uniformly
    /// desaturated.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Steer angles of the defensive "X" stance.
    ///
    /// Units: radians
    pub x_stance_angles_rad: [f64; NUM_MODULES],

    /// Wheel speeds below this magnitude hold the current steer angle
    /// instead of steering to the (meaningless) computed angle.
    ///
    /// Units: meters/second
    pub speed_deadband_ms: f64,

    // ---- TIMING ----

    /// Duration of one control tick, used by the discretization correction.
    ///
    /// Units: seconds
    pub tick_period_s: f64,

    // ---- HEADING LOCK ----

    /// Proportional gain of the heading lock controller
    pub heading_k_p: f64,

    /// Integral gain of the heading lock controller
    pub heading_k_i: f64,

    /// Derivative gain of the heading lock controller
    pub heading_k_d: f64,

    /// Maximum angular rate the heading lock may demand.
    ///
    /// Units: radians/second
    pub heading_max_omega_rads: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            module_offsets_m: [[0.3, 0.3], [0.3, -0.3], [-0.3, 0.3], [-0.3, -0.3]],
            max_speed_ms: 4.5,
            x_stance_angles_rad: [
                std::f64::consts::FRAC_PI_4,
                -std::f64::consts::FRAC_PI_4,
                -std::f64::consts::FRAC_PI_4,
                std::f64::consts::FRAC_PI_4,
            ],
            speed_deadband_ms: 1e-4,
            tick_period_s: 0.02,
            heading_k_p: 4.0,
            heading_k_i: 0.0,
            heading_k_d: 0.0,
            heading_max_omega_rads: 6.0,
        }
    }
}
