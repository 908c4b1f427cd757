//! Trapezoidal motion profile and the profiled heading controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::PidController;
use util::maths::ang_dist_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity and acceleration limits of a trapezoidal profile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileConstraints {
    /// Maximum velocity magnitude
    pub max_vel: f64,

    /// Maximum acceleration magnitude
    pub max_acc: f64,
}

/// A point on a motion profile - position and velocity.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProfileState {
    pub pos: f64,
    pub vel: f64,
}

/// Heading controller with a trapezoid-constrained setpoint.
///
/// The setpoint glides toward the goal under the velocity/acceleration
/// constraints, a PID corrects the measurement onto the setpoint, and the
/// setpoint velocity feeds forward. Heading is treated as circular: both the
/// goal and the internal setpoint are re-expressed within half a turn of the
/// measurement each step, so the error is always shortest-path.
#[derive(Debug, Clone, Serialize)]
pub struct ProfiledHeadingCtrl {
    pid: PidController,
    constraints: ProfileConstraints,
    setpoint: ProfileState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileState {
    fn flipped(&self) -> Self {
        ProfileState {
            pos: -self.pos,
            vel: -self.vel,
        }
    }
}

/// Advance a trapezoidal profile by one time step.
///
/// Returns the profile state `dt` later on the time-optimal trapezoid from
/// `current` to `goal` under the given constraints.
pub fn profile_step(
    dt_s: f64,
    current: ProfileState,
    goal: ProfileState,
    constraints: &ProfileConstraints,
) -> ProfileState {
    // The maths below assumes the goal is ahead of the current position, so
    // mirror the problem when it isn't
    let inverted = current.pos > goal.pos;

    let (mut current, goal) = if inverted {
        (current.flipped(), goal.flipped())
    } else {
        (current, goal)
    };

    current.vel = current.vel.min(constraints.max_vel).max(-constraints.max_vel);

    // Times to accelerate from/decelerate to the endpoint velocities, and
    // the distances covered doing so
    let cutoff_begin = current.vel / constraints.max_acc;
    let cutoff_dist_begin = cutoff_begin * cutoff_begin * constraints.max_acc / 2.0;
    let cutoff_end = goal.vel / constraints.max_acc;
    let cutoff_dist_end = cutoff_end * cutoff_end * constraints.max_acc / 2.0;

    // Extend the profile backwards/forwards to zero velocity so the three
    // phase durations fall out of a full trapezoid
    let full_trapezoid_dist =
        cutoff_dist_begin + (goal.pos - current.pos) + cutoff_dist_end;

    let mut accel_time = constraints.max_vel / constraints.max_acc;
    let mut full_speed_dist =
        full_trapezoid_dist - accel_time * accel_time * constraints.max_acc;

    // Triangular profile: never reaches max velocity
    if full_speed_dist < 0.0 {
        accel_time = (full_trapezoid_dist / constraints.max_acc).max(0.0).sqrt();
        full_speed_dist = 0.0;
    }

    let end_accel = (accel_time - cutoff_begin).max(0.0);
    let end_full_speed = end_accel + full_speed_dist / constraints.max_vel;
    let end_decel = end_full_speed + accel_time - cutoff_end;

    let mut result = current;
    let t = dt_s;

    if t < end_accel {
        result.vel += t * constraints.max_acc;
        result.pos += (current.vel + t * constraints.max_acc / 2.0) * t;
    } else if t < end_full_speed {
        result.vel = constraints.max_vel;
        result.pos += (current.vel + end_accel * constraints.max_acc / 2.0) * end_accel
            + constraints.max_vel * (t - end_accel);
    } else if t <= end_decel {
        let time_left = end_decel - t;
        result.vel = goal.vel + time_left * constraints.max_acc;
        result.pos = goal.pos - (goal.vel + time_left * constraints.max_acc / 2.0) * time_left;
    } else {
        result = goal;
    }

    if inverted {
        result.flipped()
    } else {
        result
    }
}

impl ProfiledHeadingCtrl {
    /// Create a new controller from PID gains and profile constraints.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, constraints: ProfileConstraints) -> Self {
        Self {
            pid: PidController::new(k_p, k_i, k_d),
            constraints,
            setpoint: ProfileState::default(),
        }
    }

    /// Re-seat the internal setpoint on the current measurement.
    ///
    /// Call before starting a new tracking task to avoid a transient from a
    /// stale setpoint.
    pub fn reset(&mut self, heading_rad: f64, vel_rads: f64) {
        self.setpoint = ProfileState {
            pos: heading_rad,
            vel: vel_rads,
        };
        self.pid.reset();
    }

    /// Get the angular rate demand driving the measured heading to the goal.
    pub fn get(&mut self, measured_rad: f64, goal_rad: f64, dt_s: f64) -> f64 {
        // Re-express goal and setpoint within half a turn of the
        // measurement, so the profile always takes the shortest rotation
        let goal = ProfileState {
            pos: measured_rad + ang_dist_pi(measured_rad, goal_rad),
            vel: 0.0,
        };
        self.setpoint.pos = measured_rad + ang_dist_pi(measured_rad, self.setpoint.pos);

        self.setpoint = profile_step(dt_s, self.setpoint, goal, &self.constraints);

        let error = ang_dist_pi(measured_rad, self.setpoint.pos);

        self.pid.get(error, dt_s) + self.setpoint.vel
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const CONSTRAINTS: ProfileConstraints = ProfileConstraints {
        max_vel: 2.0,
        max_acc: 4.0,
    };

    #[test]
    fn test_profile_respects_limits() {
        let goal = ProfileState { pos: 10.0, vel: 0.0 };
        let mut state = ProfileState::default();

        let dt = 0.02;
        let mut prev_vel = 0.0;

        for _ in 0..1000 {
            state = profile_step(dt, state, goal, &CONSTRAINTS);

            assert!(state.vel.abs() <= CONSTRAINTS.max_vel + 1e-9);
            assert!(
                ((state.vel - prev_vel) / dt).abs() <= CONSTRAINTS.max_acc + 1e-6,
                "acceleration limit exceeded"
            );
            prev_vel = state.vel;
        }

        // Converged with zero end velocity
        assert!((state.pos - 10.0).abs() < 1e-6);
        assert!(state.vel.abs() < 1e-6);
    }

    #[test]
    fn test_profile_backwards_goal() {
        let goal = ProfileState { pos: -5.0, vel: 0.0 };
        let mut state = ProfileState::default();

        for _ in 0..1000 {
            state = profile_step(0.02, state, goal, &CONSTRAINTS);
        }

        assert!((state.pos + 5.0).abs() < 1e-6);
        assert!(state.vel.abs() < 1e-6);
    }

    #[test]
    fn test_heading_ctrl_wraps_shortest_path() {
        let mut ctrl = ProfiledHeadingCtrl::new(4.0, 0.0, 0.0, CONSTRAINTS);

        let measured = -179f64.to_radians();
        ctrl.reset(measured, 0.0);

        // Target on the far side of the wrap: the shortest path is ~2 deg
        // through the wrap (negative direction), not ~358 deg the long way
        let omega = ctrl.get(measured, 179f64.to_radians(), 0.02);
        assert!(omega < 0.0, "expected rotation through the wrap, got {}", omega);
    }
}
