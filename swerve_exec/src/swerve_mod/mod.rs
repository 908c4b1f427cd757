//! Swerve module abstraction
//!
//! A "module" is one of the four independently driven and steered wheel
//! assemblies. This module defines the capability interface each wheel unit
//! implements, hiding motor/encoder hardware differences from the rest of the
//! core.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use sim::{ModuleSim, ModuleSimConfig};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of swerve modules on the robot.
///
/// Module indices are fixed and meaningful: 0 = front left, 1 = front right,
/// 2 = back left, 3 = back right.
pub const NUM_MODULES: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The state of a single wheel - its drive speed and steer orientation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WheelState {
    /// Signed linear speed of the wheel along its facing direction.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Steer orientation of the wheel.
    ///
    /// Units: radians, in [-pi, pi)
    pub angle_rad: f64,
}

/// The position of a single wheel - its cumulative drive distance and steer
/// orientation.
///
/// The distance is not guaranteed to be monotonic (the wheel can reverse);
/// only deltas between consecutive samples are meaningful.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WheelPosition {
    /// Cumulative signed distance travelled by the wheel.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Steer orientation of the wheel.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// Electrical telemetry reported by a module.
///
/// Hardware faults are surfaced through these values only - a faulty module
/// reports sentinel/last-known values, it never raises to the caller.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ModuleTelem {
    /// Drive motor voltage in volts
    pub drive_voltage_v: f64,

    /// Steer motor voltage in volts
    pub steer_voltage_v: f64,

    /// Drive motor current in amps
    pub drive_current_a: f64,

    /// Steer motor current in amps
    pub steer_current_a: f64,

    /// Drive motor temperature in celsius
    pub drive_temp_c: f64,

    /// Steer motor temperature in celsius
    pub steer_temp_c: f64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Capability interface implemented by each wheel unit.
///
/// Concrete hardware or simulation backends are injected at construction
/// time. All operations are synchronous and non-blocking: a module that
/// cannot satisfy a target silently clamps and best-efforts, it never raises
/// to the caller.
pub trait ModuleIO {
    /// Refresh the cached telemetry from the physical module.
    ///
    /// Must be called at most once per control tick, before any getter is
    /// trusted for that tick.
    fn update_inputs(&mut self);

    /// Get the last-refreshed wheel state (speed and steer angle).
    fn get_state(&self) -> WheelState;

    /// Get the last-refreshed wheel position (distance and steer angle).
    fn get_position(&self) -> WheelPosition;

    /// Get the last-refreshed steer angle from the relative sensor.
    ///
    /// Units: radians
    fn get_angle(&self) -> f64;

    /// Get the steer angle from the absolute (power-cycle-safe) sensor,
    /// corrected by the module's calibration offset.
    ///
    /// Only for use at initialisation or reset - the absolute sensor may be
    /// slower or noisier than the relative sensor used by `get_angle`.
    ///
    /// Units: radians
    fn get_absolute_angle(&self) -> f64;

    /// Get the last-refreshed electrical telemetry.
    fn get_telem(&self) -> ModuleTelem;

    /// Command the module toward a target speed and angle.
    ///
    /// Implementations apply closed-loop control internally. Idempotent per
    /// tick: repeated calls with the same target have the same effect as one.
    fn set_state(&mut self, target: WheelState);

    /// Re-zero the cumulative distance and angle tracking to the given value.
    ///
    /// Only used during pose resets.
    fn reset_position(&mut self, position: WheelPosition);
}
