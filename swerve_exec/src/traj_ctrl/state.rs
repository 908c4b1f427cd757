//! Implementations for the TrajCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::Serialize;

// Internal
use super::{Params, TrajCtrlError, Trajectory};
use crate::ctrl::{PidController, ProfileConstraints, ProfiledHeadingCtrl};
use crate::drive_ctrl::DriveCmd;
use crate::kinematics::ChassisVelocity;
use crate::loc::Pose;
use util::{
    maths::{ang_dist_pi, clamp},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Trajectory control mode.
///
/// `Following` is only ever entered through `Initializing`, and `Finished`
/// lasts exactly one tick - it exists so the final stop command is issued
/// through the normal output path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// No path loaded, the module outputs no command
    NotExecuting,

    /// A path has been accepted and the trajectory is generated on the next
    /// tick
    Initializing,

    /// Actively tracking the trajectory
    Following,

    /// The path is complete, a stop command is issued this tick
    Finished,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module state
pub struct TrajCtrl {
    pub(crate) params: Params,

    mode: Mode,

    /// Path accepted by `begin_path`, consumed by the Initializing tick
    pending_path: Option<Vec<Pose>>,

    trajectory: Option<Trajectory>,

    /// Tick time at which following started
    start_time_s: f64,

    x_ctrl: PidController,
    y_ctrl: PidController,
    heading_ctrl: ProfiledHeadingCtrl,

    pub(crate) report: StatusReport,
}

/// Data required to initialise TrajCtrl - the parameter file path.
pub struct InitData {
    pub params_file: &'static str,
}

/// Input data to trajectory control.
#[derive(Clone, Copy, Debug)]
pub struct InputData {
    /// Current pose estimate
    pub pose: Pose,

    /// Monotonic time of this tick.
    ///
    /// Units: seconds
    pub time_s: f64,
}

/// Output from TrajCtrl for this cycle.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct OutputData {
    /// Command to pass to drive control this tick
    pub cmd: DriveCmd,
}

/// Status report for TrajCtrl processing.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    pub mode: Option<Mode>,

    /// Time along the trajectory.
    ///
    /// Units: seconds
    pub path_time_s: f64,

    /// Distance between the pose estimate and the trajectory reference.
    ///
    /// Units: meters
    pub lin_error_m: f64,

    /// Shortest-path heading error to the trajectory reference.
    ///
    /// Units: radians
    pub heading_error_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrajCtrl {
    fn default() -> Self {
        let params = Params::default();
        TrajCtrl {
            mode: Mode::NotExecuting,
            pending_path: None,
            trajectory: None,
            start_time_s: 0.0,
            x_ctrl: PidController::new(params.lin_k_p, params.lin_k_i, params.lin_k_d),
            y_ctrl: PidController::new(params.lin_k_p, params.lin_k_i, params.lin_k_d),
            heading_ctrl: ProfiledHeadingCtrl::new(
                params.head_k_p,
                params.head_k_i,
                params.head_k_d,
                ProfileConstraints {
                    max_vel: params.max_ang_vel_rads,
                    max_acc: params.max_ang_acc_rads2,
                },
            ),
            params,
            report: StatusReport::default(),
        }
    }
}

impl State for TrajCtrl {
    type InitData = InitData;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module by loading its parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        self.configure(params::load(init_data.params_file)?);
        Ok(())
    }

    /// Perform cyclic processing of trajectory control.
    ///
    /// Always succeeds once a path has been validated by `begin_path` - path
    /// errors are raised there, not mid-follow.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        // Initializing generates the trajectory then falls straight through
        // to Following - no dead tick between accepting a path and moving
        if self.mode == Mode::Initializing {
            // Path presence is guaranteed by begin_path
            let path = self.pending_path.take().unwrap();
            let trajectory =
                Trajectory::new(&path, self.params.max_lin_vel_ms, self.params.max_lin_acc_ms2)?;

            info!(
                "TrajCtrl: following a {:.2} m path, {:.2} s trajectory",
                trajectory.length_m(),
                trajectory.duration_s()
            );

            self.trajectory = Some(trajectory);
            self.start_time_s = input_data.time_s;
            self.x_ctrl.reset();
            self.y_ctrl.reset();
            self.heading_ctrl.reset(input_data.pose.heading_rad, 0.0);
            self.mode = Mode::Following;
        }

        let cmd = match self.mode {
            Mode::NotExecuting => DriveCmd::None,
            Mode::Initializing => unreachable!(),
            Mode::Following => self.follow(input_data),
            // Reached by abort only - a normal finish emits its stop from
            // within `follow`
            Mode::Finished => {
                self.trajectory = None;
                DriveCmd::Stop
            }
        };

        self.report.mode = Some(self.mode);

        // Finished lasts exactly one tick: its stop command has been issued
        // above, so the next cycle is idle
        if self.mode == Mode::Finished {
            debug!("TrajCtrl: path finished, stopping");
            self.mode = Mode::NotExecuting;
        }

        Ok((OutputData { cmd }, self.report))
    }
}

impl TrajCtrl {
    /// Configure the module from an explicit parameter struct.
    pub fn configure(&mut self, params: Params) {
        self.x_ctrl = PidController::new(params.lin_k_p, params.lin_k_i, params.lin_k_d);
        self.y_ctrl = PidController::new(params.lin_k_p, params.lin_k_i, params.lin_k_d);
        self.heading_ctrl = ProfiledHeadingCtrl::new(
            params.head_k_p,
            params.head_k_i,
            params.head_k_d,
            ProfileConstraints {
                max_vel: params.max_ang_vel_rads,
                max_acc: params.max_ang_acc_rads2,
            },
        );
        self.params = params;
    }

    /// Apply updated parameters (live tuning entry point).
    ///
    /// Resets the controllers, so call between paths rather than mid-follow.
    pub fn update_params(&mut self, params: Params) {
        self.configure(params);
    }

    /// Begin following a path through the given waypoints.
    ///
    /// The path is validated here so a bad request fails before any motion.
    /// Fails if a path is already loaded - `abort` it first.
    pub fn begin_path(&mut self, waypoints: Vec<Pose>) -> Result<(), TrajCtrlError> {
        match self.mode {
            Mode::NotExecuting | Mode::Finished => (),
            _ => return Err(TrajCtrlError::PathAlreadyLoaded),
        }

        if waypoints.len() < 2 {
            return Err(TrajCtrlError::NotEnoughWaypoints(waypoints.len()));
        }

        // Dry-run the generation so degenerate paths are rejected now rather
        // than on the Initializing tick
        Trajectory::new(&waypoints, self.params.max_lin_vel_ms, self.params.max_lin_acc_ms2)?;

        self.pending_path = Some(waypoints);
        self.mode = Mode::Initializing;

        Ok(())
    }

    /// Abort the current path.
    ///
    /// The next proc cycle issues a stop command, so an aborted follow never
    /// leaves the vehicle coasting.
    pub fn abort(&mut self) {
        if self.mode != Mode::NotExecuting {
            info!("TrajCtrl: path aborted");
            self.pending_path = None;
            self.trajectory = None;
            self.mode = Mode::Finished;
        }
    }

    /// Get the current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// One tick of closed-loop trajectory tracking.
    fn follow(&mut self, input_data: &InputData) -> DriveCmd {
        // Trajectory presence is guaranteed by the Initializing transition
        let trajectory = self.trajectory.as_ref().unwrap();
        let path_time_s = input_data.time_s - self.start_time_s;
        let dt_s = self.params.tick_period_s;

        // Finish strictly on elapsed time - residual position error is the
        // caller's concern, not grounds to keep commanding motion
        if path_time_s >= trajectory.duration_s() {
            self.mode = Mode::Finished;
            self.trajectory = None;
            return DriveCmd::Stop;
        }

        // Sample the reference one tick ahead so the feedforward leads the
        // plant rather than lagging it (at t = 0 the profile is still at
        // rest, which would command zero on the first tick)
        let sample = trajectory.sample(path_time_s + dt_s);
        let error_m = sample.pose.position_m - input_data.pose.position_m;

        self.report.path_time_s = path_time_s;
        self.report.lin_error_m = error_m.norm();
        self.report.heading_error_rad =
            ang_dist_pi(input_data.pose.heading_rad, sample.pose.heading_rad);

        // Feedforward from the trajectory plus feedback on the field-frame
        // position error
        let max = self.params.max_lin_vel_ms;
        let vx_ms = clamp(
            &(sample.velocity_ms[0] + self.x_ctrl.get(error_m[0], dt_s)),
            &-max,
            &max,
        );
        let vy_ms = clamp(
            &(sample.velocity_ms[1] + self.y_ctrl.get(error_m[1], dt_s)),
            &-max,
            &max,
        );
        let omega_rads = self.heading_ctrl.get(
            input_data.pose.heading_rad,
            sample.pose.heading_rad,
            dt_s,
        );

        let field = ChassisVelocity {
            vx_ms,
            vy_ms,
            omega_rads,
        };

        DriveCmd::Velocity(ChassisVelocity::from_field_relative(
            field,
            input_data.pose.heading_rad,
        ))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn follower() -> TrajCtrl {
        let mut ctrl = TrajCtrl::default();
        ctrl.configure(Params::default());
        ctrl
    }

    #[test]
    fn test_idle_outputs_no_command() {
        let mut ctrl = follower();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: Pose::default(),
                time_s: 0.0,
            })
            .unwrap();

        assert!(matches!(output.cmd, DriveCmd::None));
        assert_eq!(report.mode, Some(Mode::NotExecuting));
    }

    #[test]
    fn test_begin_path_validates() {
        let mut ctrl = follower();

        assert!(matches!(
            ctrl.begin_path(vec![Pose::default()]),
            Err(TrajCtrlError::NotEnoughWaypoints(1))
        ));

        assert!(matches!(
            ctrl.begin_path(vec![Pose::default(), Pose::default()]),
            Err(TrajCtrlError::ZeroLengthPath)
        ));

        assert_eq!(ctrl.mode(), Mode::NotExecuting);
    }

    #[test]
    fn test_begin_while_following_rejected() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(1.0, 0.0, 0.0)])
            .unwrap();

        assert!(matches!(
            ctrl.begin_path(vec![Pose::default(), Pose::new(2.0, 0.0, 0.0)]),
            Err(TrajCtrlError::PathAlreadyLoaded)
        ));
    }

    #[test]
    fn test_first_tick_commands_motion_toward_path() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(2.0, 0.0, 0.0)])
            .unwrap();

        // Initializing falls through to Following on the same tick
        let (output, report) = ctrl
            .proc(&InputData {
                pose: Pose::default(),
                time_s: 0.02,
            })
            .unwrap();

        assert_eq!(report.mode, Some(Mode::Following));
        match output.cmd {
            DriveCmd::Velocity(v) => assert!(v.vx_ms > 0.0),
            other => panic!("expected a velocity command, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_issues_stop_then_idles() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(1.0, 0.0, 0.0)])
            .unwrap();

        let (_, _) = ctrl
            .proc(&InputData {
                pose: Pose::default(),
                time_s: 0.0,
            })
            .unwrap();

        // Jump past the trajectory end with the robot at the endpoint
        let end = Pose::new(1.0, 0.0, 0.0);
        let (output, report) = ctrl
            .proc(&InputData {
                pose: end,
                time_s: 100.0,
            })
            .unwrap();

        assert!(matches!(output.cmd, DriveCmd::Stop));
        assert_eq!(report.mode, Some(Mode::Finished));

        // The tick after Finished is idle again
        let (output, report) = ctrl
            .proc(&InputData {
                pose: end,
                time_s: 100.02,
            })
            .unwrap();
        assert!(matches!(output.cmd, DriveCmd::None));
        assert_eq!(report.mode, Some(Mode::NotExecuting));
    }

    #[test]
    fn test_finish_is_time_based() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(1.0, 0.0, 0.0)])
            .unwrap();

        ctrl.proc(&InputData {
            pose: Pose::default(),
            time_s: 0.0,
        })
        .unwrap();

        // 1 m at 2.5 m/s^2 is triangular with a ~1.26 s duration. Once that
        // has elapsed the follower must stop even with the robot well short
        // of the endpoint - no further velocity commands
        let (output, report) = ctrl
            .proc(&InputData {
                pose: Pose::new(0.5, 0.0, 0.0),
                time_s: 1.5,
            })
            .unwrap();
        assert!(matches!(output.cmd, DriveCmd::Stop));
        assert_eq!(report.mode, Some(Mode::Finished));
        assert_eq!(ctrl.mode(), Mode::NotExecuting);
    }

    #[test]
    fn test_abort_issues_stop() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(1.0, 0.0, 0.0)])
            .unwrap();
        ctrl.proc(&InputData {
            pose: Pose::default(),
            time_s: 0.0,
        })
        .unwrap();

        ctrl.abort();

        let (output, _) = ctrl
            .proc(&InputData {
                pose: Pose::default(),
                time_s: 0.02,
            })
            .unwrap();
        assert!(matches!(output.cmd, DriveCmd::Stop));
        assert_eq!(ctrl.mode(), Mode::NotExecuting);
    }

    #[test]
    fn test_follow_straight_path_converges() {
        let mut ctrl = follower();

        ctrl.begin_path(vec![Pose::default(), Pose::new(1.0, 0.0, 0.0)])
            .unwrap();

        // Crude plant: integrate the commanded velocity directly
        let mut pose = Pose::default();
        let dt = 0.02;
        let mut finished = false;

        for i in 0..500 {
            let (output, _) = ctrl
                .proc(&InputData {
                    pose,
                    time_s: i as f64 * dt,
                })
                .unwrap();

            match output.cmd {
                DriveCmd::Velocity(v) => {
                    // Heading is zero throughout so body and field frames
                    // coincide
                    pose.position_m[0] += v.vx_ms * dt;
                    pose.position_m[1] += v.vy_ms * dt;
                }
                DriveCmd::Stop => {
                    finished = true;
                    break;
                }
                _ => (),
            }
        }

        assert!(finished);
        assert!((pose.position_m[0] - 1.0).abs() < 0.05);
        assert!(pose.position_m[1].abs() < 1e-6);
    }
}
