//! # Data Store
//!
//! Global data store for the executable. Owns every module state and its
//! cyclic input/output snapshots, so the whole of a cycle is inspectable in
//! one place.

use crate::{drive_ctrl, traj_ctrl};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Elapsed session time at the start of this cycle
    pub elapsed_time_s: f64,

    // DriveCtrl
    pub drive_ctrl: drive_ctrl::DriveCtrl,
    pub drive_ctrl_input: drive_ctrl::InputData,
    pub drive_ctrl_output: Option<drive_ctrl::OutputData>,
    pub drive_ctrl_status_rpt: drive_ctrl::StatusReport,

    // TrajCtrl
    pub traj_ctrl: traj_ctrl::TrajCtrl,
    pub traj_ctrl_output: Option<traj_ctrl::OutputData>,
    pub traj_ctrl_status_rpt: traj_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and
    /// sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        if self.num_cycles % (cycle_frequency_hz as u128) == 0 {
            self.is_1_hz_cycle = true;
        } else {
            self.is_1_hz_cycle = false;
        }

        self.drive_ctrl_input = drive_ctrl::InputData::default();
        self.drive_ctrl_output = None;
        self.drive_ctrl_status_rpt = drive_ctrl::StatusReport::default();
        self.traj_ctrl_output = None;
        self.traj_ctrl_status_rpt = traj_ctrl::StatusReport::default();

        self.elapsed_time_s = util::session::get_elapsed_seconds();
    }
}
