//! Simulated swerve module backend
//!
//! Provides a first-order closed-loop model of a drive/steer wheel unit,
//! good enough to exercise the full control stack without hardware. The
//! steer axis slews toward its setpoint at a limited rate, the drive axis
//! accelerates toward its setpoint speed at a limited rate, and electrical
//! telemetry is synthesised from the commanded effort.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{ModuleIO, ModuleTelem, WheelPosition, WheelState};
use util::maths::{ang_dist_pi, clamp, wrap_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configuration for a simulated module.
///
/// This is the simulation analogue of the per-module hardware configuration
/// that a real driver backend would receive at construction.
#[derive(Clone, Copy, Debug)]
pub struct ModuleSimConfig {
    /// Duration of one control tick, used to step the model.
    ///
    /// Units: seconds
    pub tick_period_s: f64,

    /// Maximum drive acceleration of the model.
    ///
    /// Units: meters/second^2
    pub max_drive_accel_ms2: f64,

    /// Maximum steer slew rate of the model.
    ///
    /// Units: radians/second
    pub max_steer_rate_rads: f64,

    /// Calibration offset of the absolute steer encoder.
    ///
    /// Units: radians
    pub abs_encoder_offset_rad: f64,

    /// Nominal bus voltage used for telemetry synthesis.
    ///
    /// Units: volts
    pub nominal_voltage_v: f64,

    /// Maximum wheel speed, used to scale synthesised drive effort.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,
}

impl Default for ModuleSimConfig {
    fn default() -> Self {
        ModuleSimConfig {
            tick_period_s: 0.02,
            max_drive_accel_ms2: 12.0,
            max_steer_rate_rads: 20.0,
            abs_encoder_offset_rad: 0.0,
            nominal_voltage_v: 12.0,
            max_speed_ms: 4.5,
        }
    }
}

/// A simulated swerve module.
pub struct ModuleSim {
    config: ModuleSimConfig,

    /// Continuously-unwrapped steer angle of the model in radians
    angle_rad: f64,

    /// Current wheel speed in meters/second
    speed_ms: f64,

    /// Cumulative drive distance in meters
    distance_m: f64,

    /// Current setpoint, `None` until the first `set_state`
    setpoint: Option<WheelState>,

    /// Telemetry synthesised on the last `update_inputs`
    telem: ModuleTelem,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleSim {
    /// Create a new simulated module from its configuration.
    pub fn new(config: ModuleSimConfig) -> Self {
        ModuleSim {
            config,
            angle_rad: 0.0,
            speed_ms: 0.0,
            distance_m: 0.0,
            setpoint: None,
            telem: ModuleTelem::default(),
        }
    }
}

impl ModuleIO for ModuleSim {
    /// Step the model by one tick toward the current setpoint.
    fn update_inputs(&mut self) {
        let dt = self.config.tick_period_s;

        let target = self.setpoint.unwrap_or(WheelState {
            speed_ms: 0.0,
            angle_rad: wrap_pi(self.angle_rad),
        });

        // Steer slews along the shortest rotation toward the setpoint
        let ang_err = ang_dist_pi(self.angle_rad, target.angle_rad);
        let max_step = self.config.max_steer_rate_rads * dt;
        self.angle_rad += clamp(&ang_err, &-max_step, &max_step);

        // Drive accelerates toward the setpoint speed
        let spd_err = target.speed_ms - self.speed_ms;
        let max_delta = self.config.max_drive_accel_ms2 * dt;
        self.speed_ms += clamp(&spd_err, &-max_delta, &max_delta);

        self.distance_m += self.speed_ms * dt;

        // Synthesise electrical telemetry from the commanded effort
        let drive_effort = clamp(
            &(target.speed_ms / self.config.max_speed_ms),
            &-1.0,
            &1.0,
        );
        let steer_effort = clamp(&(ang_err / max_step.max(1e-9)), &-1.0, &1.0);

        self.telem = ModuleTelem {
            drive_voltage_v: drive_effort * self.config.nominal_voltage_v,
            steer_voltage_v: steer_effort * self.config.nominal_voltage_v,
            drive_current_a: drive_effort.abs() * 40.0,
            steer_current_a: steer_effort.abs() * 20.0,
            drive_temp_c: 25.0,
            steer_temp_c: 25.0,
        };
    }

    fn get_state(&self) -> WheelState {
        WheelState {
            speed_ms: self.speed_ms,
            angle_rad: wrap_pi(self.angle_rad),
        }
    }

    fn get_position(&self) -> WheelPosition {
        WheelPosition {
            distance_m: self.distance_m,
            angle_rad: self.angle_rad,
        }
    }

    fn get_angle(&self) -> f64 {
        self.angle_rad
    }

    fn get_absolute_angle(&self) -> f64 {
        // The raw absolute sensor reads the true angle shifted by the mount
        // offset, the correction removes it again
        let raw = wrap_pi(self.angle_rad + self.config.abs_encoder_offset_rad);
        wrap_pi(raw - self.config.abs_encoder_offset_rad)
    }

    fn get_telem(&self) -> ModuleTelem {
        self.telem
    }

    fn set_state(&mut self, target: WheelState) {
        self.setpoint = Some(target);
    }

    fn reset_position(&mut self, position: WheelPosition) {
        self.distance_m = position.distance_m;
        self.angle_rad = position.angle_rad;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_tracks_setpoint() {
        let mut module = ModuleSim::new(ModuleSimConfig::default());

        module.set_state(WheelState {
            speed_ms: 1.0,
            angle_rad: 0.5,
        });

        // Plenty of ticks to converge
        for _ in 0..100 {
            module.update_inputs();
        }

        let state = module.get_state();
        assert!((state.speed_ms - 1.0).abs() < 1e-6);
        assert!((state.angle_rad - 0.5).abs() < 1e-6);

        // Distance should have accumulated
        assert!(module.get_position().distance_m > 0.0);
    }

    #[test]
    fn test_sim_reset_position() {
        let mut module = ModuleSim::new(ModuleSimConfig::default());

        module.set_state(WheelState {
            speed_ms: 2.0,
            angle_rad: 0.0,
        });
        for _ in 0..10 {
            module.update_inputs();
        }

        module.reset_position(WheelPosition {
            distance_m: 0.0,
            angle_rad: 0.0,
        });

        assert_eq!(module.get_position().distance_m, 0.0);
        assert_eq!(module.get_angle(), 0.0);
    }

    #[test]
    fn test_sim_absolute_angle_corrected() {
        let mut config = ModuleSimConfig::default();
        config.abs_encoder_offset_rad = 1.0;
        let mut module = ModuleSim::new(config);

        module.set_state(WheelState {
            speed_ms: 0.0,
            angle_rad: 0.3,
        });
        for _ in 0..100 {
            module.update_inputs();
        }

        // The calibration offset must cancel out
        assert!((module.get_absolute_angle() - 0.3).abs() < 1e-6);
    }
}
