//! Parameters for the TrajCtrl module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// TrajCtrl parameters.
///
/// All gains act on field-frame errors.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Params {
    /// Maximum translational speed along the path.
    ///
    /// Units: meters/second
    pub max_lin_vel_ms: f64,

    /// Maximum translational acceleration along the path.
    ///
    /// Units: meters/second/second
    pub max_lin_acc_ms2: f64,

    /// Maximum heading rate while following.
    ///
    /// Units: radians/second
    pub max_ang_vel_rads: f64,

    /// Maximum heading acceleration while following.
    ///
    /// Units: radians/second/second
    pub max_ang_acc_rads2: f64,

    /// Proportional gain of the position (x and y) controllers
    pub lin_k_p: f64,

    /// Integral gain of the position (x and y) controllers
    pub lin_k_i: f64,

    /// Dervative gain of the position (x and y) controllers
    pub lin_k_d: f64,

    /// Proportional gain of the heading controller
    pub head_k_p: f64,

    /// Integral gain of the heading controller
    pub head_k_i: f64,

    /// Dervative gain of the heading controller
    pub head_k_d: f64,

    /// Expected controller tick period.
    ///
    /// Units: seconds
    pub tick_period_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Params {
            max_lin_vel_ms: 3.0,
            max_lin_acc_ms2: 2.5,
            max_ang_vel_rads: 4.0,
            max_ang_acc_rads2: 8.0,
            lin_k_p: 2.0,
            lin_k_i: 0.0,
            lin_k_d: 0.0,
            head_k_p: 4.0,
            head_k_i: 0.0,
            head_k_d: 0.0,
            tick_period_s: 0.02,
        }
    }
}
