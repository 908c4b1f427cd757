//! Commands passed into DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::kinematics::ChassisVelocity;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command to be executed by DriveCtrl.
#[derive(Clone, Copy, Debug, Serialize)]
pub enum DriveCmd {
    /// No command - interpreted as continue with the last command.
    None,

    /// Stop - zero all drive speeds while holding the current steer angles.
    Stop,

    /// Drive at the given body-frame chassis velocity.
    ///
    /// Field-frame demands must be rotated first via
    /// [`ChassisVelocity::from_field_relative`].
    Velocity(ChassisVelocity),

    /// Defensive stance - steer all four modules into the fixed "X" pattern
    /// with no drive, maximising resistance to being pushed. A discrete
    /// setpoint set, not derived from kinematics.
    XStance,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCmd {
    /// Determine if the command is valid (i.e. contains finite data).
    pub fn is_valid(&self) -> bool {
        match self {
            DriveCmd::Velocity(v) => v.is_valid(),
            _ => true,
        }
    }
}
