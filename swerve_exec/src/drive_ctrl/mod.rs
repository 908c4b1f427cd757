//! Drive control module
//!
//! Turns a desired chassis velocity (optionally heading-locked) into
//! per-module wheel setpoints each control tick, applying discretization,
//! desaturation and rotation-minimisation policies. Also owns the pose
//! estimator and exposes the `(pose, reset_pose, speeds, drive)` surface an
//! external autonomous-routine planner drives this core through.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cmd;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use cmd::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Expected {expected} modules, found {found}")]
    WrongModuleCount { expected: usize, found: usize },

    #[error("Recieved an invalid drive command: {0:?}")]
    InvalidCmd(cmd::DriveCmd),

    #[error("The module has not been initialised")]
    NotInitialised,
}
