//! Parameters structure for the localisation module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the pose estimator.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocParams {
    /// Length of the odometry history window kept for matching timestamped
    /// corrections.
    ///
    /// Units: seconds
    pub history_window_s: f64,

    /// Weight applied to a pose correction when blending it into the
    /// estimate. 0 ignores corrections entirely, 1 trusts them completely.
    pub correction_weight: f64,
}

impl Default for LocParams {
    fn default() -> Self {
        LocParams {
            history_window_s: 1.5,
            correction_weight: 0.5,
        }
    }
}
