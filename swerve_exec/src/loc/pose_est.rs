//! Pose estimator implementation
//!
//! Fuses per-tick wheel odometry with the gyro heading and asynchronous,
//! timestamped external pose corrections.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use std::collections::VecDeque;

// Internal
use super::{LocParams, Pose};
use crate::kinematics::{SwerveKinematics, Twist};
use crate::swerve_mod::{WheelPosition, NUM_MODULES};
use util::maths::ang_dist_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose estimator.
///
/// Owns the authoritative field pose. Wheel odometry is authoritative for
/// position, the gyro is authoritative for heading; when no gyro is fitted
/// the heading is dead-reckoned from the odometry twist and is expected to
/// drift (a degraded mode - corrections never repair it).
pub struct PoseEst {
    params: LocParams,
    kinematics: SwerveKinematics,

    /// Current best estimate of the field pose
    pose: Pose,

    /// Wheel positions at the previous tick, `None` before the first update
    last_positions: Option<[WheelPosition; NUM_MODULES]>,

    /// Gyro heading at the previous tick, `None` before the first gyro
    /// sample
    last_gyro_rad: Option<f64>,

    /// Timestamped pose snapshots, oldest first, used to match corrections
    /// against where the robot was when the measurement was taken
    history: VecDeque<(f64, Pose)>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseEst {
    /// Create a new estimator at the given initial pose.
    pub fn new(kinematics: SwerveKinematics, params: LocParams, initial_pose: Pose) -> Self {
        PoseEst {
            params,
            kinematics,
            pose: initial_pose,
            last_positions: None,
            last_gyro_rad: None,
            history: VecDeque::new(),
        }
    }

    /// Get an immutable snapshot of the current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Integrate one tick of odometry into the estimate.
    ///
    /// `gyro_heading_rad` is the continuous gyro reading, or `None` when no
    /// orientation sensor is fitted. The gyro is consumed as per-tick deltas
    /// so the estimate's heading tracks it exactly while `reset` stays free
    /// to re-baseline; the first sample only seeds the baseline. Without a
    /// gyro the twist's rotational component is integrated instead.
    pub fn update(
        &mut self,
        gyro_heading_rad: Option<f64>,
        positions: &[WheelPosition; NUM_MODULES],
        time_s: f64,
    ) -> Pose {
        // Odometry twist from the wheel position deltas
        let mut twist = match self.last_positions {
            Some(prev) => {
                let mut deltas = [WheelPosition::default(); NUM_MODULES];
                for i in 0..NUM_MODULES {
                    deltas[i] = WheelPosition {
                        distance_m: positions[i].distance_m - prev[i].distance_m,
                        angle_rad: positions[i].angle_rad,
                    };
                }
                self.kinematics.to_twist(&deltas)
            }
            None => Twist::default(),
        };

        // The gyro overrides the odometry-derived rotation when present
        if let Some(gyro) = gyro_heading_rad {
            if let Some(prev_gyro) = self.last_gyro_rad {
                twist.dtheta_rad = ang_dist_pi(prev_gyro, gyro);
            }
            self.last_gyro_rad = Some(gyro);
        }

        self.pose = self.pose.exp(&twist);
        self.last_positions = Some(*positions);

        // Record the snapshot and prune anything outside the window
        self.history.push_back((time_s, self.pose));
        let oldest_allowed = time_s - self.params.history_window_s;
        while let Some((t, _)) = self.history.front() {
            if *t < oldest_allowed {
                self.history.pop_front();
            } else {
                break;
            }
        }

        self.pose
    }

    /// Blend a timestamped external pose correction into the estimate.
    ///
    /// The correction is weighted against the buffered pose closest to its
    /// timestamp, and the resulting offset is carried forward through all
    /// later snapshots and the current estimate - odometry motion that
    /// happened after the measurement was taken is preserved, not discarded.
    /// A timestamp older than the buffer blends against the current pose
    /// instead (degraded, never fatal). Only the position component is
    /// blended: heading belongs to the gyro.
    pub fn add_correction(&mut self, measured: Pose, time_s: f64) {
        // Find the snapshot closest in time to the measurement. The history
        // is time-ordered so the first non-earlier entry (or its
        // predecessor) is the closest.
        let anchor = match self.history.front() {
            Some((front_t, _)) if time_s >= *front_t => {
                let mut best = 0;
                let mut best_dt = f64::INFINITY;
                for (i, (t, _)) in self.history.iter().enumerate() {
                    let dt = (t - time_s).abs();
                    if dt < best_dt {
                        best = i;
                        best_dt = dt;
                    } else {
                        break;
                    }
                }
                Some(best)
            }
            _ => None,
        };

        let offset = match anchor {
            Some(idx) => {
                let anchor_pose = self.history[idx].1;
                let offset =
                    (measured.position_m - anchor_pose.position_m) * self.params.correction_weight;

                // Replay: every snapshot at or after the measurement sees the
                // same field-frame shift, so later corrections match against
                // corrected history
                for i in idx..self.history.len() {
                    self.history[i].1.position_m += offset;
                }
                offset
            }
            None => {
                // Stale or unmatched: degrade to blending at the present
                trace!("Pose correction at t={:.3} predates history, blending at current pose", time_s);
                (measured.position_m - self.pose.position_m) * self.params.correction_weight
            }
        };

        self.pose.position_m += offset;
    }

    /// Discard the history and reset the estimate to the given pose.
    ///
    /// Used at initialisation and for operator-commanded re-localisation.
    /// The wheel baseline is dropped (callers may re-zero the modules at the
    /// same time), so the next update re-seeds with zero motion. The gyro
    /// baseline is kept: deltas against continuous hardware stay valid.
    pub fn reset(&mut self, pose: Pose) {
        self.pose = pose;
        self.last_positions = None;
        self.history.clear();
    }

    /// Replace the estimator parameters (live tuning entry point).
    pub fn update_params(&mut self, params: LocParams) {
        self.params = params;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector2;

    fn square_kinematics() -> SwerveKinematics {
        SwerveKinematics::new([
            Vector2::new(0.3, 0.3),
            Vector2::new(0.3, -0.3),
            Vector2::new(-0.3, 0.3),
            Vector2::new(-0.3, -0.3),
        ])
    }

    fn straight_positions(distance_m: f64) -> [WheelPosition; NUM_MODULES] {
        [WheelPosition {
            distance_m,
            angle_rad: 0.0,
        }; NUM_MODULES]
    }

    fn estimator(weight: f64) -> PoseEst {
        PoseEst::new(
            square_kinematics(),
            LocParams {
                history_window_s: 1.5,
                correction_weight: weight,
            },
            Pose::default(),
        )
    }

    #[test]
    fn test_straight_line_odometry() {
        let mut est = estimator(0.5);

        est.update(Some(0.0), &straight_positions(0.0), 0.0);
        est.update(Some(0.0), &straight_positions(0.1), 0.02);
        let pose = est.update(Some(0.0), &straight_positions(0.2), 0.04);

        assert!((pose.position_m[0] - 0.2).abs() < 1e-9);
        assert!(pose.position_m[1].abs() < 1e-9);
        assert!(pose.heading_rad.abs() < 1e-12);
    }

    #[test]
    fn test_gyro_overrides_odometry_heading() {
        let mut est = estimator(0.5);

        // Wheels say straight ahead but the gyro sees a turn
        est.update(Some(0.0), &straight_positions(0.0), 0.0);
        let pose = est.update(Some(0.1), &straight_positions(0.1), 0.02);

        assert!((pose.heading_rad - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_heading_fallback_integrates_twist() {
        let mut est = estimator(0.5);

        // Pure rotation wheel deltas, no gyro fitted
        let r = (2f64 * 0.3 * 0.3).sqrt();
        let dtheta = 0.05;
        let angles = [
            (0.3f64).atan2(-0.3),
            (0.3f64).atan2(0.3),
            (-0.3f64).atan2(-0.3),
            (-0.3f64).atan2(0.3),
        ];

        let at = |d: f64| {
            let mut p = [WheelPosition::default(); NUM_MODULES];
            for i in 0..NUM_MODULES {
                p[i] = WheelPosition {
                    distance_m: d,
                    angle_rad: angles[i],
                };
            }
            p
        };

        est.update(None, &at(0.0), 0.0);
        let pose = est.update(None, &at(r * dtheta), 0.02);

        assert!((pose.heading_rad - dtheta).abs() < 1e-9);
    }

    #[test]
    fn test_correction_replayed_through_later_motion() {
        let mut est = estimator(0.5);

        // A -> B -> C along x: 0.0, 0.1, 0.2
        est.update(Some(0.0), &straight_positions(0.0), 0.0);
        est.update(Some(0.0), &straight_positions(0.1), 0.02);
        est.update(Some(0.0), &straight_positions(0.2), 0.04);

        // Vision saw the robot at x = 0.15 when odometry said 0.1: a +0.05
        // offset at the midpoint, weighted by 0.5
        est.add_correction(Pose::new(0.15, 0.0, 0.0), 0.02);

        // The offset propagates through the B -> C motion: 0.2 + 0.025, not
        // a jump toward the raw corrected value
        assert!((est.pose().position_m[0] - 0.225).abs() < 1e-9);
    }

    #[test]
    fn test_stale_correction_blends_at_current_pose() {
        let mut est = estimator(0.5);

        est.update(Some(0.0), &straight_positions(0.0), 10.0);
        est.update(Some(0.0), &straight_positions(0.2), 10.02);

        // Timestamp far older than any buffered snapshot
        est.add_correction(Pose::new(0.1, 0.0, 0.0), 1.0);

        // Blended at the current pose: 0.2 + 0.5 * (0.1 - 0.2)
        assert!((est.pose().position_m[0] - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_correction_never_touches_heading() {
        let mut est = estimator(1.0);

        // First sample seeds the gyro baseline, the second turns by 0.3
        est.update(Some(0.0), &straight_positions(0.0), 0.0);
        est.update(Some(0.3), &straight_positions(0.1), 0.02);
        assert!((est.pose().heading_rad - 0.3).abs() < 1e-12);

        // A correction with a wildly different heading moves position only
        est.add_correction(Pose::new(5.0, 5.0, -2.0), 0.02);

        assert!((est.pose().heading_rad - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_reset_discards_history() {
        let mut est = estimator(1.0);

        est.update(Some(0.0), &straight_positions(0.0), 0.0);
        est.update(Some(0.0), &straight_positions(0.5), 0.02);

        est.reset(Pose::new(3.0, 4.0, 1.0));
        assert!((est.pose().position_m[0] - 3.0).abs() < 1e-12);
        assert!((est.pose().heading_rad - 1.0).abs() < 1e-12);

        // A correction timestamped before the reset must blend at the
        // current pose, not against discarded history
        est.add_correction(Pose::new(0.0, 0.0, 0.0), 0.01);
        assert!(est.pose().position_m[0].abs() < 1e-9);
        assert!(est.pose().position_m[1].abs() < 1e-9);
    }
}
