//! Parameters for the TargetSel module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// TargetSel parameters - the labelled target map.
#[derive(Clone, Debug, Deserialize)]
pub struct Params {
    /// The target map, in priority order (earlier entries win distance ties)
    pub targets: Vec<TargetEntry>,
}

/// A single labelled pose in the target map.
#[derive(Clone, Debug, Deserialize)]
pub struct TargetEntry {
    pub label: String,

    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Units: radians
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetEntry {
    /// The entry's field pose.
    pub fn pose(&self) -> Pose {
        Pose::new(self.x_m, self.y_m, self.heading_rad)
    }
}
