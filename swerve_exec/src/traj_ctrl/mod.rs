//! Trajectory control module
//!
//! Follows a multi-waypoint path by generating a time-parameterised
//! trapezoidal trajectory over the path's arc length and closing the loop on
//! the live pose estimate each tick. Output is a body-frame velocity command
//! for drive control - this module never touches the wheels directly.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod trajectory;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;
pub use trajectory::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrajCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("A path needs at least 2 waypoints, got {0}")]
    NotEnoughWaypoints(usize),

    #[error("The path has zero length")]
    ZeroLengthPath,

    #[error("A path is already being followed, abort it first")]
    PathAlreadyLoaded,
}
