//! Target selection module
//!
//! Picks the nearest labelled target pose from a configured field map, so
//! autonomous routines can ask "which scoring station am I closest to?"
//! without duplicating the map.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Selects targets from a fixed labelled map of field poses.
pub struct TargetSel {
    params: Params,
}

/// A labelled target pose resolved by the selector.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub label: String,
    pub pose: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetSel {
    /// Create a selector over an explicit target map.
    pub fn new(params: Params) -> Self {
        TargetSel { params }
    }

    /// Create a selector by loading the target map from a parameter file.
    pub fn from_file(params_file: &str) -> Result<Self, util::params::LoadError> {
        Ok(TargetSel {
            params: util::params::load(params_file)?,
        })
    }

    /// Get the target nearest to the given pose.
    ///
    /// Distance is positional only, heading plays no part. Ties resolve to
    /// the lowest-index entry of the map so the result is deterministic.
    /// Returns `None` only when the map is empty.
    pub fn nearest(&self, pose: &Pose) -> Option<Target> {
        let mut best: Option<(f64, &TargetEntry)> = None;

        for entry in &self.params.targets {
            let distance_m = entry.pose().distance_to(pose);
            match best {
                // Strict comparison keeps the earlier entry on a tie
                Some((best_m, _)) if distance_m >= best_m => (),
                _ => best = Some((distance_m, entry)),
            }
        }

        best.map(|(_, entry)| Target {
            label: entry.label.clone(),
            pose: entry.pose(),
        })
    }

    /// Look a target up by its label.
    pub fn get(&self, label: &str) -> Option<Target> {
        self.params
            .targets
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| Target {
                label: entry.label.clone(),
                pose: entry.pose(),
            })
    }

    /// Number of targets in the map.
    pub fn len(&self) -> usize {
        self.params.targets.len()
    }

    /// True when the map has no targets.
    pub fn is_empty(&self) -> bool {
        self.params.targets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
