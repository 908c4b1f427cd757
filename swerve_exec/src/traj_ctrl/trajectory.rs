//! Time-parameterised trajectory over a waypoint path
//!
//! The path is a polyline through the waypoints. Speed along its arc length
//! follows a trapezoidal profile (falling back to a triangular one when the
//! path is too short to reach the cruise speed), so the trajectory starts
//! and ends at rest.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use super::TrajCtrlError;
use crate::loc::Pose;
use util::maths::ang_dist_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A time-parameterised trajectory through a list of field poses.
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// Path waypoints with zero-length segments removed
    waypoints: Vec<Pose>,

    /// Cumulative arc length at each waypoint, `cum_lengths_m[0] == 0`
    cum_lengths_m: Vec<f64>,

    total_length_m: f64,

    /// Peak speed actually reached by the profile (the cruise speed, or the
    /// triangular peak on short paths)
    peak_vel_ms: f64,

    accel_time_s: f64,
    cruise_time_s: f64,
    max_acc_ms2: f64,
}

/// A single point sampled from a trajectory.
#[derive(Clone, Copy, Debug)]
pub struct TrajectorySample {
    /// Reference pose (position on the polyline, heading interpolated
    /// between the bounding waypoints)
    pub pose: Pose,

    /// Field-frame velocity feedforward.
    ///
    /// Units: meters/second
    pub velocity_ms: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    /// Generate a trajectory through the given waypoints.
    ///
    /// Fails if there are fewer than two waypoints or the path has zero
    /// length. Zero-length segments (consecutive duplicate positions) are
    /// dropped.
    pub fn new(
        waypoints: &[Pose],
        max_vel_ms: f64,
        max_acc_ms2: f64,
    ) -> Result<Self, TrajCtrlError> {
        if waypoints.len() < 2 {
            return Err(TrajCtrlError::NotEnoughWaypoints(waypoints.len()));
        }

        let mut kept: Vec<Pose> = vec![waypoints[0]];
        let mut cum_lengths_m = vec![0.0];
        let mut total_length_m = 0.0;

        for waypoint in &waypoints[1..] {
            let segment_m = (waypoint.position_m - kept.last().unwrap().position_m).norm();
            if segment_m > 0.0 {
                total_length_m += segment_m;
                cum_lengths_m.push(total_length_m);
                kept.push(*waypoint);
            }
        }

        if total_length_m <= 0.0 {
            return Err(TrajCtrlError::ZeroLengthPath);
        }

        // Trapezoid over the arc length, triangular when the path is too
        // short to reach the cruise speed
        let accel_dist_m = max_vel_ms * max_vel_ms / (2.0 * max_acc_ms2);
        let (peak_vel_ms, accel_time_s, cruise_time_s) = if 2.0 * accel_dist_m >= total_length_m {
            let peak = (total_length_m * max_acc_ms2).sqrt();
            (peak, peak / max_acc_ms2, 0.0)
        } else {
            (
                max_vel_ms,
                max_vel_ms / max_acc_ms2,
                (total_length_m - 2.0 * accel_dist_m) / max_vel_ms,
            )
        };

        Ok(Trajectory {
            waypoints: kept,
            cum_lengths_m,
            total_length_m,
            peak_vel_ms,
            accel_time_s,
            cruise_time_s,
            max_acc_ms2,
        })
    }

    /// Total duration of the trajectory.
    ///
    /// Units: seconds
    pub fn duration_s(&self) -> f64 {
        2.0 * self.accel_time_s + self.cruise_time_s
    }

    /// Total arc length of the path.
    ///
    /// Units: meters
    pub fn length_m(&self) -> f64 {
        self.total_length_m
    }

    /// Sample the trajectory at a given time since its start.
    ///
    /// Times outside `[0, duration]` clamp to the endpoints, so sampling
    /// past the end holds the final pose at rest.
    pub fn sample(&self, time_s: f64) -> TrajectorySample {
        let time_s = time_s.clamp(0.0, self.duration_s());

        let speed_ms = self.speed_at(time_s);
        let distance_m = self.distance_at(time_s);

        self.locate(distance_m, speed_ms)
    }

    /// Profile speed at a given time.
    fn speed_at(&self, time_s: f64) -> f64 {
        if time_s < self.accel_time_s {
            self.max_acc_ms2 * time_s
        } else if time_s < self.accel_time_s + self.cruise_time_s {
            self.peak_vel_ms
        } else {
            self.peak_vel_ms - self.max_acc_ms2 * (time_s - self.accel_time_s - self.cruise_time_s)
        }
    }

    /// Distance travelled along the path at a given time.
    fn distance_at(&self, time_s: f64) -> f64 {
        let accel_dist_m = 0.5 * self.max_acc_ms2 * self.accel_time_s * self.accel_time_s;

        if time_s < self.accel_time_s {
            0.5 * self.max_acc_ms2 * time_s * time_s
        } else if time_s < self.accel_time_s + self.cruise_time_s {
            accel_dist_m + self.peak_vel_ms * (time_s - self.accel_time_s)
        } else {
            let decel_s = time_s - self.accel_time_s - self.cruise_time_s;
            accel_dist_m + self.peak_vel_ms * self.cruise_time_s + self.peak_vel_ms * decel_s
                - 0.5 * self.max_acc_ms2 * decel_s * decel_s
        }
    }

    /// Resolve an arc-length distance to a pose and feedforward velocity.
    fn locate(&self, distance_m: f64, speed_ms: f64) -> TrajectorySample {
        let distance_m = distance_m.clamp(0.0, self.total_length_m);

        // Find the segment containing this distance. Segments are short so a
        // linear scan is fine.
        let mut seg = 0;
        while seg + 2 < self.cum_lengths_m.len() && self.cum_lengths_m[seg + 1] < distance_m {
            seg += 1;
        }

        let start = &self.waypoints[seg];
        let end = &self.waypoints[seg + 1];
        let seg_length_m = self.cum_lengths_m[seg + 1] - self.cum_lengths_m[seg];
        let frac = (distance_m - self.cum_lengths_m[seg]) / seg_length_m;

        let direction = (end.position_m - start.position_m) / seg_length_m;
        let position_m = start.position_m + direction * (frac * seg_length_m);
        let heading_rad =
            start.heading_rad + ang_dist_pi(start.heading_rad, end.heading_rad) * frac;

        TrajectorySample {
            pose: Pose {
                position_m,
                heading_rad,
            },
            velocity_ms: direction * speed_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
