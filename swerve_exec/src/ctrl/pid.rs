//! PID controller implementation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller.
///
/// Time is passed in explicitly rather than sampled from the wall clock so
/// the control loop stays deterministic under the fixed-period scheduler.
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral: 0f64,
            prev_error: None,
        }
    }

    /// Get the value of the controller for the given error and time step.
    pub fn get(&mut self, error: f64, dt_s: f64) -> f64 {
        // Accumulate the integral term.
        //
        // If there's no time difference we don't accumulate, the alternative
        // of adding the raw error produces a large spike compared to normal
        // operation.
        if dt_s > 0f64 {
            self.integral += error * dt_s;
        }

        // Calculate the derivative.
        //
        // On the first call there is no previous error, so no derivative.
        let deriv = match self.prev_error {
            Some(e) if dt_s > 0f64 => (error - e) / dt_s,
            _ => 0f64,
        };

        // Remember the previous error
        self.prev_error = Some(error);

        self.k_p * error + self.k_i * self.integral + self.k_d * deriv
    }

    /// Clear the accumulated state, keeping the gains.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }

    /// Replace the gains (live tuning entry point), clearing the accumulated
    /// state so stale integral action doesn't couple into the new gains.
    pub fn set_gains(&mut self, k_p: f64, k_i: f64, k_d: f64) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.k_d = k_d;
        self.reset();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);

        assert!((pid.get(1.5, 0.02) - 3.0).abs() < 1e-12);
        assert!((pid.get(-0.5, 0.02) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);

        pid.get(1.0, 0.1);
        let out = pid.get(1.0, 0.1);

        assert!((out - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_no_first_call_spike() {
        let mut pid = PidController::new(0.0, 0.0, 1.0);

        // No previous error: derivative must be zero, not error/dt
        assert_eq!(pid.get(10.0, 0.02), 0.0);

        // Constant error: still zero
        assert_eq!(pid.get(10.0, 0.02), 0.0);

        // Changing error: slope
        assert!((pid.get(10.2, 0.02) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);

        pid.get(5.0, 1.0);
        pid.reset();

        assert_eq!(pid.get(0.0, 1.0), 0.0);
    }
}
