//! # Feedback controllers module
//!
//! This module provides the PID and motion-profiled controllers used by the
//! drive and trajectory control modules, including their error calculations.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pid;
mod profile;

pub use pid::PidController;
pub use profile::{ProfileConstraints, ProfileState, ProfiledHeadingCtrl};
