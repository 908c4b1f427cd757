//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - System input acquisition (module telemetry refresh inside
//!           DriveCtrl)
//!         - Trajectory control processing
//!         - Drive control processing
//!         - Telemetry output
//!
//! This binary runs the drive core against the simulation module backend:
//! it selects the nearest configured target, follows a path to it, then
//! parks in the X stance.
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State`
//!        trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use swerve_lib::{
    data_store::DataStore,
    drive_ctrl::{self, DriveCmd},
    loc::Pose,
    swerve_mod::{ModuleIO, ModuleSim, ModuleSimConfig, NUM_MODULES},
    target_sel::TargetSel,
    traj_ctrl::{self, Mode},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.02;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

/// Limit on the number of consecutive cycle overruns before the executable
/// aborts.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 5;

/// Number of cycles to hold the X stance before exiting.
const PARK_CYCLES: u128 = 50;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Phase of the demonstration sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DemoPhase {
    /// Following the path to the selected target
    DriveToTarget,

    /// Holding the X stance at the target
    Park(u128),

    /// Demo complete, exit the main loop
    Done,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("swerve_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Swerve Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    // Simulation backends for the four wheel units
    let modules: Vec<Box<dyn ModuleIO>> = (0..NUM_MODULES)
        .map(|_| Box::new(ModuleSim::new(ModuleSimConfig::default())) as Box<dyn ModuleIO>)
        .collect();

    ds.drive_ctrl
        .init(
            drive_ctrl::InitData {
                params_file: "drive_ctrl.toml",
                loc_params_file: "loc.toml",
                modules,
                initial_pose: Pose::default(),
            },
            &session,
        )
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    ds.traj_ctrl
        .init(
            traj_ctrl::InitData {
                params_file: "traj_ctrl.toml",
            },
            &session,
        )
        .wrap_err("Failed to initialise TrajCtrl")?;
    info!("TrajCtrl init complete");

    let target_sel =
        TargetSel::from_file("target_sel.toml").wrap_err("Failed to initialise TargetSel")?;
    info!("TargetSel init complete ({} targets)", target_sel.len());

    info!("Module initialisation complete\n");

    // ---- SELECT TARGET AND BEGIN PATH ----

    let start_pose = ds.drive_ctrl.pose();
    let target = target_sel
        .nearest(&start_pose)
        .ok_or_else(|| eyre!("The target map is empty"))?;

    info!(
        "Selected target \"{}\" at ({:.2}, {:.2}) m",
        target.label, target.pose.position_m[0], target.pose.position_m[1]
    );

    ds.traj_ctrl
        .begin_path(vec![start_pose, target.pose])
        .wrap_err("Failed to begin the path")?;

    let mut phase = DemoPhase::DriveToTarget;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- TRAJECTORY CONTROL PROCESSING ----

        let pose = ds.drive_ctrl.pose();

        match ds.traj_ctrl.proc(&traj_ctrl::InputData {
            pose,
            time_s: ds.elapsed_time_s,
        }) {
            Ok((o, r)) => {
                ds.traj_ctrl_output = Some(o);
                ds.traj_ctrl_status_rpt = r;
            }
            Err(e) => warn!("Error during TrajCtrl processing: {}", e),
        }

        // ---- DEMO SEQUENCING ----

        match phase {
            DemoPhase::DriveToTarget => {
                // Path complete once TrajCtrl has issued its stop and gone
                // idle
                if ds.traj_ctrl.mode() == Mode::NotExecuting && ds.num_cycles > 0 {
                    info!("Target reached, parking in X stance");
                    ds.drive_ctrl_input.cmd = Some(DriveCmd::XStance);
                    phase = DemoPhase::Park(ds.num_cycles);
                }
            }
            DemoPhase::Park(since_cycle) => {
                if ds.num_cycles - since_cycle >= PARK_CYCLES {
                    phase = DemoPhase::Done;
                }
            }
            DemoPhase::Done => (),
        }

        // ---- DRIVE CONTROL PROCESSING ----

        // While following, TrajCtrl's command feeds DriveCtrl; the demo
        // sequencer overrides it once the path is done
        if ds.drive_ctrl_input.cmd.is_none() {
            ds.drive_ctrl_input.cmd = ds.traj_ctrl_output.map(|o| o.cmd);
        }
        ds.drive_ctrl_input.time_s = ds.elapsed_time_s;

        match ds.drive_ctrl.proc(&ds.drive_ctrl_input) {
            Ok((o, r)) => {
                ds.drive_ctrl_output = Some(o);
                ds.drive_ctrl_status_rpt = r;
            }
            Err(e) => {
                // DriveCtrl errors usually just mean a bad command was sent,
                // so issue the warning and continue.
                warn!("Error during DriveCtrl processing: {}", e)
            }
        }

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            let tm = ds.drive_ctrl.telemetry();
            match serde_json::to_string(&tm) {
                Ok(json) => info!("TM: {}", json),
                Err(e) => warn!("Could not serialise telemetry: {}", e),
            }
        }

        if phase == DemoPhase::Done {
            info!("Demo sequence complete, stopping");
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        ds.num_cycles += 1;

        let cycle_dur_s = cycle_start_instant.elapsed().as_secs_f64();

        if cycle_dur_s < CYCLE_PERIOD_S {
            ds.num_consec_cycle_overruns = 0;
            thread::sleep(Duration::from_secs_f64(CYCLE_PERIOD_S - cycle_dur_s));
        } else {
            warn!(
                "Cycle overran by {:.3} ms",
                (cycle_dur_s - CYCLE_PERIOD_S) * 1000.0
            );
            ds.num_consec_cycle_overruns += 1;

            if ds.num_consec_cycle_overruns > MAX_CONSEC_CYCLE_OVERRUNS {
                return Err(eyre!(
                    "Maximum number of consecutive cycle overruns ({}) exceeded",
                    MAX_CONSEC_CYCLE_OVERRUNS
                ));
            }
        }
    }

    info!("Final pose: {:?}", ds.drive_ctrl.pose());

    Ok(())
}
