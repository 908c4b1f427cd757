//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{DriveCmd, DriveCtrlError, Params};
use crate::ctrl::PidController;
use crate::kinematics::{self, ChassisVelocity, SwerveKinematics};
use crate::loc::{LocParams, Pose, PoseCorrection, PoseEst};
use crate::swerve_mod::{ModuleIO, ModuleTelem, WheelPosition, WheelState, NUM_MODULES};
use util::{
    maths::{ang_dist_pi, clamp},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
pub struct DriveCtrl {
    pub(crate) params: Params,

    /// Kinematics built from the (immutable) module offsets
    kinematics: Option<SwerveKinematics>,

    /// The four wheel units, injected at initialisation. Indices are fixed:
    /// FL, FR, BL, BR.
    modules: Vec<Box<dyn ModuleIO>>,

    /// The pose estimator - single source of truth for the field pose
    pose_est: Option<PoseEst>,

    /// Heading lock state, mutated only through `set_heading_lock`
    heading_lock: HeadingLock,

    /// Feedback controller driving the heading onto the lock target
    heading_ctrl: PidController,

    pub(crate) current_cmd: DriveCmd,

    pub(crate) report: StatusReport,

    pub(crate) output: Option<OutputData>,
}

/// Data required to initialise DriveCtrl.
pub struct InitData {
    /// Path to the DriveCtrl parameter file, relative to the params dir
    pub params_file: &'static str,

    /// Path to the localisation parameter file, relative to the params dir
    pub loc_params_file: &'static str,

    /// The four wheel unit backends (hardware or simulation), FL, FR, BL, BR
    pub modules: Vec<Box<dyn ModuleIO>>,

    /// Field pose to initialise the estimator at
    pub initial_pose: Pose,
}

/// Input data to drive control.
#[derive(Default)]
pub struct InputData {
    /// The drive command to be executed, or `None` if there is no new
    /// command on this cycle.
    pub cmd: Option<DriveCmd>,

    /// Continuous gyro heading, or `None` when no orientation sensor is
    /// fitted.
    ///
    /// Units: radians
    pub gyro_heading_rad: Option<f64>,

    /// Pose corrections received since the last tick, in non-decreasing
    /// timestamp order per source.
    pub corrections: Vec<PoseCorrection>,

    /// Monotonic time of this tick.
    ///
    /// Units: seconds
    pub time_s: f64,
}

/// Output from DriveCtrl for this cycle.
#[derive(Clone, Copy, Serialize, Debug, Default)]
pub struct OutputData {
    /// The wheel setpoints commanded to the modules this tick
    pub setpoints: [WheelState; NUM_MODULES],

    /// Snapshot of the current pose estimate
    pub pose: Pose,

    /// Measured body-frame speeds (inverse kinematics of the measured wheel
    /// states)
    pub speeds: ChassisVelocity,
}

/// Status report for DriveCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the wheel speeds were uniformly desaturated this tick
    pub desaturated: bool,

    /// Per-module flag set when the rotation optimisation flipped the wheel
    pub flipped: [bool; NUM_MODULES],

    /// True if the heading lock was driving omega this tick
    pub heading_locked: bool,

    /// Shortest-path heading error to the lock target.
    ///
    /// Units: radians
    pub heading_error_rad: f64,
}

/// Heading lock state.
///
/// When enabled the commanded rotational rate is replaced by a feedback loop
/// holding the target heading. With no explicit target the lock target
/// defaults to the heading at engage time.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct HeadingLock {
    pub enabled: bool,

    /// Lock target in radians
    pub target_rad: Option<f64>,
}

/// Read-only telemetry snapshot emitted for observability.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct DriveTm {
    pub pose: Pose,
    pub states: [WheelState; NUM_MODULES],
    pub positions: [WheelPosition; NUM_MODULES],
    pub telem: [ModuleTelem; NUM_MODULES],
    pub heading_lock: HeadingLock,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriveCtrl {
    fn default() -> Self {
        DriveCtrl {
            params: Params::default(),
            kinematics: None,
            modules: Vec::new(),
            pose_est: None,
            heading_lock: HeadingLock::default(),
            heading_ctrl: PidController::new(0.0, 0.0, 0.0),
            current_cmd: DriveCmd::Stop,
            report: StatusReport::default(),
            output: None,
        }
    }
}

impl State for DriveCtrl {
    type InitData = InitData;
    type InitError = DriveCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the parameter file paths, the four injected
    /// module backends and the initial field pose.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        let drive_params = params::load(init_data.params_file)?;
        let loc_params = params::load(init_data.loc_params_file)?;

        self.configure(
            drive_params,
            loc_params,
            init_data.modules,
            init_data.initial_pose,
        )
    }

    /// Perform cyclic processing of drive control.
    ///
    /// One call is one control tick: refresh module telemetry once, advance
    /// the pose estimate, drain queued pose corrections, then execute the
    /// current command. Every tick produces a best-effort output - saturation
    /// and degraded sensing are reported, never raised.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        let kinematics = match self.kinematics.as_ref() {
            Some(k) => k.clone(),
            None => return Err(DriveCtrlError::NotInitialised),
        };

        // ---- TELEMETRY REFRESH ----

        // At most once per tick, before any getter is trusted
        for module in self.modules.iter_mut() {
            module.update_inputs();
        }

        let mut states = [WheelState::default(); NUM_MODULES];
        let mut positions = [WheelPosition::default(); NUM_MODULES];
        for (i, module) in self.modules.iter().enumerate() {
            states[i] = module.get_state();
            positions[i] = module.get_position();
        }

        // ---- POSE ESTIMATION ----

        let pose = {
            let pose_est = match self.pose_est.as_mut() {
                Some(p) => p,
                None => return Err(DriveCtrlError::NotInitialised),
            };

            pose_est.update(input_data.gyro_heading_rad, &positions, input_data.time_s);

            // Drain this tick's corrections in timestamp order
            for correction in &input_data.corrections {
                pose_est.add_correction(correction.pose, correction.time_s);
            }

            pose_est.pose()
        };

        // ---- COMMAND UPDATE ----

        if let Some(cmd) = input_data.cmd {
            if !cmd.is_valid() {
                return Err(DriveCtrlError::InvalidCmd(cmd));
            }

            // `None` means continue with the previous command
            if !matches!(cmd, DriveCmd::None) {
                self.current_cmd = cmd;
            }
        }

        // ---- SETPOINT CALCULATION ----

        let setpoints = match self.current_cmd {
            DriveCmd::None | DriveCmd::Stop => {
                // Zero the drive speeds while holding the measured steer
                // angles, so stopping never swings the wheels
                let mut setpoints = [WheelState::default(); NUM_MODULES];
                for i in 0..NUM_MODULES {
                    setpoints[i] = WheelState {
                        speed_ms: 0.0,
                        angle_rad: states[i].angle_rad,
                    };
                }
                setpoints
            }
            DriveCmd::XStance => {
                let mut setpoints = [WheelState::default(); NUM_MODULES];
                for i in 0..NUM_MODULES {
                    setpoints[i] = WheelState {
                        speed_ms: 0.0,
                        angle_rad: self.params.x_stance_angles_rad[i],
                    };
                }
                setpoints
            }
            DriveCmd::Velocity(velocity) => {
                self.calc_velocity_setpoints(&kinematics, velocity, &pose, &states)
            }
        };

        // ---- MODULE COMMANDING ----

        for (i, module) in self.modules.iter_mut().enumerate() {
            module.set_state(setpoints[i]);
        }

        trace!(
            "DriveCtrl setpoints:\n    speeds: {:?}\n    angles: {:?}",
            setpoints.iter().map(|s| s.speed_ms).collect::<Vec<_>>(),
            setpoints.iter().map(|s| s.angle_rad).collect::<Vec<_>>()
        );

        let output = OutputData {
            setpoints,
            pose,
            speeds: kinematics.to_chassis_velocity(&states),
        };

        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl DriveCtrl {
    /// Configure the module from explicit parameter structs.
    ///
    /// This is the construction-time injection point - `init` goes through
    /// here after loading the parameter files. Each module's cumulative
    /// tracking is re-zeroed from its absolute steer sensor.
    pub fn configure(
        &mut self,
        params: Params,
        loc_params: LocParams,
        mut modules: Vec<Box<dyn ModuleIO>>,
        initial_pose: Pose,
    ) -> Result<(), DriveCtrlError> {
        if modules.len() != NUM_MODULES {
            return Err(DriveCtrlError::WrongModuleCount {
                expected: NUM_MODULES,
                found: modules.len(),
            });
        }

        let mut offsets = [Vector2::zeros(); NUM_MODULES];
        for (i, offset) in params.module_offsets_m.iter().enumerate() {
            offsets[i] = Vector2::new(offset[0], offset[1]);
        }
        let kinematics = SwerveKinematics::new(offsets);

        // Seat each module's tracking on its absolute (power-cycle-safe)
        // sensor - the only point the absolute sensor is read
        for module in modules.iter_mut() {
            let angle_rad = module.get_absolute_angle();
            module.reset_position(WheelPosition {
                distance_m: 0.0,
                angle_rad,
            });
        }

        self.heading_ctrl =
            PidController::new(params.heading_k_p, params.heading_k_i, params.heading_k_d);
        self.pose_est = Some(PoseEst::new(kinematics.clone(), loc_params, initial_pose));
        self.kinematics = Some(kinematics);
        self.modules = modules;
        self.params = params;

        Ok(())
    }

    /// Apply updated parameters (live tuning entry point).
    ///
    /// The module offsets are immutable configuration - only the gains and
    /// limits are taken from the new parameter set.
    pub fn update_params(&mut self, params: Params) {
        self.heading_ctrl
            .set_gains(params.heading_k_p, params.heading_k_i, params.heading_k_d);

        self.params.max_speed_ms = params.max_speed_ms;
        self.params.x_stance_angles_rad = params.x_stance_angles_rad;
        self.params.speed_deadband_ms = params.speed_deadband_ms;
        self.params.tick_period_s = params.tick_period_s;
        self.params.heading_k_p = params.heading_k_p;
        self.params.heading_k_i = params.heading_k_i;
        self.params.heading_k_d = params.heading_k_d;
        self.params.heading_max_omega_rads = params.heading_max_omega_rads;
    }

    /// Set a new drive command outside the cyclic input path.
    ///
    /// This is part of the planner surface - an external autonomous routine
    /// calls this between ticks.
    pub fn drive(&mut self, cmd: DriveCmd) -> Result<(), DriveCtrlError> {
        if !cmd.is_valid() {
            return Err(DriveCtrlError::InvalidCmd(cmd));
        }

        if !matches!(cmd, DriveCmd::None) {
            self.current_cmd = cmd;
        }

        Ok(())
    }

    /// Get an immutable snapshot of the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose_est.as_ref().map(|p| p.pose()).unwrap_or_default()
    }

    /// Reset the pose estimate, re-zeroing module tracking from the absolute
    /// steer sensors.
    pub fn reset_pose(&mut self, pose: Pose) {
        for module in self.modules.iter_mut() {
            let angle_rad = module.get_absolute_angle();
            module.reset_position(WheelPosition {
                distance_m: 0.0,
                angle_rad,
            });
        }

        if let Some(pose_est) = self.pose_est.as_mut() {
            pose_est.reset(pose);
        }
    }

    /// Get the measured body-frame speeds (inverse kinematics of the
    /// measured wheel states).
    pub fn speeds(&self) -> ChassisVelocity {
        let kinematics = match self.kinematics.as_ref() {
            Some(k) => k,
            None => return ChassisVelocity::zero(),
        };

        let mut states = [WheelState::default(); NUM_MODULES];
        for (i, module) in self.modules.iter().enumerate() {
            states[i] = module.get_state();
        }

        kinematics.to_chassis_velocity(&states)
    }

    /// Engage or release the heading lock.
    ///
    /// When engaging with no explicit target the current heading becomes the
    /// lock target.
    pub fn set_heading_lock(&mut self, enabled: bool, target_rad: Option<f64>) {
        self.heading_lock.enabled = enabled;

        if enabled {
            self.heading_lock.target_rad = match target_rad {
                Some(t) => Some(t),
                None => Some(self.pose().heading_rad),
            };
            self.heading_ctrl.reset();
        } else {
            self.heading_lock.target_rad = target_rad;
        }
    }

    /// Get the current heading lock state.
    pub fn heading_lock(&self) -> HeadingLock {
        self.heading_lock
    }

    /// Get a read-only telemetry snapshot for the observability side
    /// channel.
    pub fn telemetry(&self) -> DriveTm {
        let mut states = [WheelState::default(); NUM_MODULES];
        let mut positions = [WheelPosition::default(); NUM_MODULES];
        let mut telem = [ModuleTelem::default(); NUM_MODULES];

        for (i, module) in self.modules.iter().enumerate() {
            states[i] = module.get_state();
            positions[i] = module.get_position();
            telem[i] = module.get_telem();
        }

        DriveTm {
            pose: self.pose(),
            states,
            positions,
            telem,
            heading_lock: self.heading_lock,
        }
    }

    /// Calculate the per-module setpoints for a velocity command.
    ///
    /// Command flow: heading lock -> discretize -> forward kinematics ->
    /// desaturate -> per module: angle hold at zero speed, optimise, cosine
    /// scale.
    fn calc_velocity_setpoints(
        &mut self,
        kinematics: &SwerveKinematics,
        velocity: ChassisVelocity,
        pose: &Pose,
        states: &[WheelState; NUM_MODULES],
    ) -> [WheelState; NUM_MODULES] {
        let mut velocity = velocity;

        // Heading lock replaces the commanded omega with feedback onto the
        // lock target, shortest-path in heading
        if self.heading_lock.enabled {
            let target = self
                .heading_lock
                .target_rad
                .unwrap_or(pose.heading_rad);

            let error = ang_dist_pi(pose.heading_rad, target);
            let omega = self.heading_ctrl.get(error, self.params.tick_period_s);

            velocity.omega_rads = clamp(
                &omega,
                &-self.params.heading_max_omega_rads,
                &self.params.heading_max_omega_rads,
            );

            self.report.heading_locked = true;
            self.report.heading_error_rad = error;
        }

        let velocity = kinematics::discretize(&velocity, self.params.tick_period_s);

        let mut setpoints = kinematics.to_wheel_states(&velocity);

        self.report.desaturated = kinematics::desaturate(&mut setpoints, self.params.max_speed_ms);

        for i in 0..NUM_MODULES {
            // A wheel with no commanded speed has no meaningful angle from
            // the kinematics: hold the measured angle instead
            if setpoints[i].speed_ms.abs() < self.params.speed_deadband_ms {
                setpoints[i].angle_rad = states[i].angle_rad;
            }

            let optimized = kinematics::optimize(setpoints[i], states[i].angle_rad);
            self.report.flipped[i] = optimized.speed_ms != setpoints[i].speed_ms;

            setpoints[i] = kinematics::cosine_scale(optimized, states[i].angle_rad);
        }

        setpoints
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::swerve_mod::{ModuleSim, ModuleSimConfig};

    fn sim_modules() -> Vec<Box<dyn ModuleIO>> {
        (0..NUM_MODULES)
            .map(|_| Box::new(ModuleSim::new(ModuleSimConfig::default())) as Box<dyn ModuleIO>)
            .collect()
    }

    fn configured() -> DriveCtrl {
        let mut ctrl = DriveCtrl::default();
        ctrl.configure(
            Params::default(),
            LocParams::default(),
            sim_modules(),
            Pose::default(),
        )
        .unwrap();
        ctrl
    }

    fn tick(ctrl: &mut DriveCtrl, cmd: Option<DriveCmd>, time_s: f64) -> (OutputData, StatusReport) {
        ctrl.proc(&InputData {
            cmd,
            gyro_heading_rad: Some(0.0),
            corrections: vec![],
            time_s,
        })
        .unwrap()
    }

    #[test]
    fn test_straight_drive_one_tick() {
        let mut ctrl = configured();

        // 1 m/s forward for one 20 ms tick on the symmetric square layout:
        // all four wheels commanded straight ahead at 1 m/s
        let (output, report) = tick(
            &mut ctrl,
            Some(DriveCmd::Velocity(ChassisVelocity {
                vx_ms: 1.0,
                vy_ms: 0.0,
                omega_rads: 0.0,
            })),
            0.02,
        );

        for setpoint in &output.setpoints {
            assert!((setpoint.speed_ms - 1.0).abs() < 1e-9);
            assert!(setpoint.angle_rad.abs() < 1e-9);
        }
        assert!(!report.desaturated);
    }

    #[test]
    fn test_desaturation_reported() {
        let mut ctrl = configured();

        let (output, report) = tick(
            &mut ctrl,
            Some(DriveCmd::Velocity(ChassisVelocity {
                vx_ms: 10.0,
                vy_ms: 0.0,
                omega_rads: 6.0,
            })),
            0.02,
        );

        assert!(report.desaturated);

        let max = output
            .setpoints
            .iter()
            .map(|s| s.speed_ms.abs())
            .fold(0f64, f64::max);
        assert!(max <= ctrl.params.max_speed_ms + 1e-9);
    }

    #[test]
    fn test_heading_lock_wraps() {
        let mut ctrl = configured();

        ctrl.reset_pose(Pose::new(0.0, 0.0, -179f64.to_radians()));
        ctrl.set_heading_lock(true, Some(179f64.to_radians()));

        let (_, report) = ctrl
            .proc(&InputData {
                cmd: Some(DriveCmd::Velocity(ChassisVelocity::zero())),
                gyro_heading_rad: None,
                corrections: vec![],
                time_s: 0.02,
            })
            .unwrap();

        // Error is the ~2 deg shortest path across the wrap, never ~358 deg
        assert!(report.heading_locked);
        assert!(report.heading_error_rad < 0.0);
        assert!(report.heading_error_rad.abs() < 5f64.to_radians());
    }

    #[test]
    fn test_heading_lock_defaults_to_engage_heading() {
        let mut ctrl = configured();

        ctrl.reset_pose(Pose::new(0.0, 0.0, 1.0));
        ctrl.set_heading_lock(true, None);

        assert!((ctrl.heading_lock().target_rad.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_x_stance() {
        let mut ctrl = configured();

        let (output, _) = tick(&mut ctrl, Some(DriveCmd::XStance), 0.02);

        for (setpoint, expected) in output
            .setpoints
            .iter()
            .zip(ctrl.params.x_stance_angles_rad.iter())
        {
            assert_eq!(setpoint.speed_ms, 0.0);
            assert!((setpoint.angle_rad - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_stop_holds_steer_angles() {
        let mut ctrl = configured();

        // Drive sideways for a while so the wheels steer away from zero
        for i in 1..20 {
            tick(
                &mut ctrl,
                Some(DriveCmd::Velocity(ChassisVelocity {
                    vx_ms: 0.0,
                    vy_ms: 1.0,
                    omega_rads: 0.0,
                })),
                i as f64 * 0.02,
            );
        }

        let (output, _) = tick(&mut ctrl, Some(DriveCmd::Stop), 0.5);

        let tm = ctrl.telemetry();
        for (setpoint, state) in output.setpoints.iter().zip(tm.states.iter()) {
            assert_eq!(setpoint.speed_ms, 0.0);
            assert!((setpoint.angle_rad - state.angle_rad).abs() < 1e-9);
        }
    }

    #[test]
    fn test_odometry_through_proc() {
        let mut ctrl = configured();

        // Drive forward; the sim modules accumulate distance and the pose
        // estimate must advance along +x
        for i in 1..=50 {
            tick(
                &mut ctrl,
                Some(DriveCmd::Velocity(ChassisVelocity {
                    vx_ms: 1.0,
                    vy_ms: 0.0,
                    omega_rads: 0.0,
                })),
                i as f64 * 0.02,
            );
        }

        let pose = ctrl.pose();
        assert!(pose.position_m[0] > 0.5);
        assert!(pose.position_m[1].abs() < 1e-6);
    }

    #[test]
    fn test_wrong_module_count_rejected() {
        let mut ctrl = DriveCtrl::default();

        let result = ctrl.configure(
            Params::default(),
            LocParams::default(),
            vec![Box::new(ModuleSim::new(ModuleSimConfig::default()))],
            Pose::default(),
        );

        assert!(matches!(
            result,
            Err(DriveCtrlError::WrongModuleCount { .. })
        ));
    }

    #[test]
    fn test_invalid_cmd_rejected() {
        let mut ctrl = configured();

        let result = ctrl.drive(DriveCmd::Velocity(ChassisVelocity {
            vx_ms: f64::NAN,
            vy_ms: 0.0,
            omega_rads: 0.0,
        }));

        assert!(matches!(result, Err(DriveCtrlError::InvalidCmd(_))));
    }
}
