//! Conversions between physical units and drive wire integers.
//!
//! | Quantity      | Physical | Wire                              |
//! |---------------|----------|-----------------------------------|
//! | Position      | rad      | encoder increments (`i32`)        |
//! | Velocity      | rad/s    | rpm (`i32`)                       |
//! | Accel / decel | rad/s²   | rpm/s (`u32`)                     |
//! | Current       | A        | ‰ of nominal current (`i16`)      |
//! | Torque        | Nm       | ‰ of nominal current (`i16`)      |
//!
//! Current is telemetry only; commands carry torque, never current.
//!
//! Float to integer conversions round to nearest and saturate at the wire
//! type bounds. A zero factor (nominal current not yet known) decodes to 0.

use core::f64::consts::TAU;

use super::config::DriveConfig;

/// rpm per rad/s.
pub const RPM_PER_RAD_S: f64 = 60.0 / TAU;

/// Scaling factors derived from a drive configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    /// Encoder increments per rad.
    pub position: f64,
    /// rpm per rad/s (also rpm/s per rad/s²).
    pub velocity: f64,
    /// Per-mille of nominal current per A.
    pub current: f64,
    /// Per-mille of nominal current per Nm.
    pub torque: f64,
    /// Command clamp [Nm].
    pub max_torque_nm: f64,
}

impl Scaling {
    /// Physical scaling for `cfg`.
    pub fn from_config(cfg: &DriveConfig) -> Self {
        let current = if cfg.nominal_current_a > 0.0 {
            1000.0 / cfg.nominal_current_a
        } else {
            0.0
        };
        let torque_per_amp = cfg.motor_constant * cfg.gear_ratio;
        let torque = if torque_per_amp > 0.0 {
            current / torque_per_amp
        } else {
            0.0
        };

        Self {
            position: cfg.position_encoder_resolution as f64 / TAU,
            velocity: RPM_PER_RAD_S,
            current,
            torque,
            max_torque_nm: cfg.max_torque_nm(),
        }
    }

    /// Identity scaling for raw command passthrough, without clamping.
    pub fn raw() -> Self {
        Self {
            position: 1.0,
            velocity: 1.0,
            current: 1.0,
            torque: 1.0,
            max_torque_nm: f64::INFINITY,
        }
    }

    // ─── Commands (physical → wire) ─────────────────────────────────

    #[inline]
    pub fn position_to_wire(&self, rad: f64) -> i32 {
        (rad * self.position).round() as i32
    }

    #[inline]
    pub fn velocity_to_wire(&self, rad_s: f64) -> i32 {
        (rad_s * self.velocity).round() as i32
    }

    /// Profile acceleration or deceleration; negative inputs saturate to 0.
    #[inline]
    pub fn accel_to_wire(&self, rad_s2: f64) -> u32 {
        (rad_s2 * self.velocity).round() as u32
    }

    /// Torque clamped to `±max_torque_nm`.
    #[inline]
    pub fn torque_to_wire(&self, nm: f64) -> i16 {
        let nm = nm.clamp(-self.max_torque_nm, self.max_torque_nm);
        (nm * self.torque).round() as i16
    }

    // ─── Telemetry (wire → physical) ────────────────────────────────

    #[inline]
    pub fn position_from_wire(&self, ticks: i32) -> f64 {
        divide(ticks as f64, self.position)
    }

    #[inline]
    pub fn velocity_from_wire(&self, rpm: i32) -> f64 {
        divide(rpm as f64, self.velocity)
    }

    #[inline]
    pub fn current_from_wire(&self, per_mille: i16) -> f64 {
        divide(per_mille as f64, self.current)
    }

    #[inline]
    pub fn torque_from_wire(&self, per_mille: i16) -> f64 {
        divide(per_mille as f64, self.torque)
    }
}

impl Default for Scaling {
    fn default() -> Self {
        Self::from_config(&DriveConfig::default())
    }
}

#[inline]
fn divide(value: f64, factor: f64) -> f64 {
    if factor == 0.0 { 0.0 } else { value / factor }
}
