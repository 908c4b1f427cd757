//! # Swerve drive library.
//!
//! This library allows other crates in the workspace (and the `swerve_exec`
//! binary) to access the motion-control core of the four wheel independently
//! steered ("swerve") robot.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Feedback controllers - PID and motion-profiled controllers shared by the
/// drive and trajectory modules
pub mod ctrl;

/// Global data store passed between modules by the cyclic executive
pub mod data_store;

/// Drive control module - converts chassis velocity commands into individual
/// wheel setpoints
pub mod drive_ctrl;

/// Kinematics engine - stateless maths mapping chassis velocity to and from
/// wheel states
pub mod kinematics;

/// Localisation module - fuses wheel odometry with the gyro and external pose
/// corrections
pub mod loc;

/// Swerve module abstraction - the capability interface each wheel unit
/// implements, plus the simulation backend
pub mod swerve_mod;

/// Target selection module - picks the nearest labelled field location
pub mod target_sel;

/// Trajectory control module - follows a pre-planned multi-point path
pub mod traj_ctrl;
