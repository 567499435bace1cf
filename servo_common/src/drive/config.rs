//! Drive configuration types.
//!
//! `DriveConfig` is loaded once (usually from a TOML file) before the first
//! cycle and treated as read-only afterwards. The only field the drive may
//! backfill is `nominal_current_a`, read from the motor data object during
//! startup when configured as `0.0`.
//!
//! # TOML Example
//!
//! ```toml
//! rx_pdo_type = "csp"
//! tx_pdo_type = "csp"
//! mode_of_operation = "cyclic_sync_position"
//! position_encoder_resolution = 4096
//! motor_constant = 0.0335
//! gear_ratio = 1.0
//! nominal_current_a = 2.5
//! max_current_a = 5.0
//! ```

use crate::cia402::ModeOfOperation;
use crate::config::{ConfigError, Validate};
use crate::consts::{
    DEFAULT_MIN_TARGET_STATE_READINGS, DEFAULT_SDO_VERIFY_TIMEOUT_US,
    DEFAULT_STATE_CHANGE_MAX_TIMEOUT_US, DEFAULT_STATE_CHANGE_MIN_TIMEOUT_US,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default function for config_run_sdo_verify_timeout_us
fn default_sdo_verify_timeout_us() -> u64 {
    DEFAULT_SDO_VERIFY_TIMEOUT_US
}

/// Default function for drive_state_change_min_timeout_us
fn default_state_change_min_timeout_us() -> u64 {
    DEFAULT_STATE_CHANGE_MIN_TIMEOUT_US
}

/// Default function for drive_state_change_max_timeout_us
fn default_state_change_max_timeout_us() -> u64 {
    DEFAULT_STATE_CHANGE_MAX_TIMEOUT_US
}

/// Default function for min_successful_target_state_readings
fn default_min_target_state_readings() -> u32 {
    DEFAULT_MIN_TARGET_STATE_READINGS
}

/// Default function for gear_ratio / motor_constant
fn default_one() -> f64 {
    1.0
}

/// Write-direction (command) PDO layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RxPdoType {
    /// No layout selected.
    #[default]
    Na,
    /// Control word and mode only.
    Standard,
    /// Cyclic synchronous position.
    Csp,
    /// Cyclic synchronous torque.
    Cst,
    /// Cyclic synchronous velocity.
    Csv,
    /// Combined position and torque setpoints.
    CstCsp,
    /// Profile velocity.
    Pvm,
}

/// Read-direction (telemetry) PDO layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TxPdoType {
    /// No layout selected.
    #[default]
    Na,
    /// Status word only.
    Standard,
    /// Cyclic synchronous position.
    Csp,
    /// Cyclic synchronous torque.
    Cst,
    /// Cyclic synchronous velocity.
    Csv,
    /// Combined position and torque feedback.
    CstCsp,
    /// Profile velocity, adds demand velocity.
    Pvm,
}

/// Drive parameter bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    /// Command frame layout.
    #[serde(default)]
    pub rx_pdo_type: RxPdoType,

    /// Telemetry frame layout.
    #[serde(default)]
    pub tx_pdo_type: TxPdoType,

    /// Mode of operation written during startup.
    #[serde(default)]
    pub mode_of_operation: ModeOfOperation,

    /// Allow commands to switch the mode of operation at runtime.
    /// Only honored with the standard frame layout in both directions.
    #[serde(default)]
    pub use_multiple_modes_of_operation: bool,

    /// Send command values to the wire without unit conversion.
    #[serde(default)]
    pub use_raw_commands: bool,

    /// Encoder increments per motor revolution.
    pub position_encoder_resolution: u32,

    /// Motor torque constant [Nm/A].
    #[serde(default = "default_one")]
    pub motor_constant: f64,

    /// Gear ratio between motor and output.
    #[serde(default = "default_one")]
    pub gear_ratio: f64,

    /// Motor nominal current [A]. `0.0` = read from the drive during startup.
    #[serde(default)]
    pub nominal_current_a: f64,

    /// Command clamp [A].
    pub max_current_a: f64,

    /// Delay between a configuration SDO write and its read-back [µs].
    #[serde(default = "default_sdo_verify_timeout_us")]
    pub config_run_sdo_verify_timeout_us: u64,

    /// Minimum dwell between two state-transition control words [µs].
    #[serde(default = "default_state_change_min_timeout_us")]
    pub drive_state_change_min_timeout_us: u64,

    /// Overall timeout of a PDO state change [µs].
    #[serde(default = "default_state_change_max_timeout_us")]
    pub drive_state_change_max_timeout_us: u64,

    /// Consecutive reads of the target state needed to complete a change.
    #[serde(default = "default_min_target_state_readings")]
    pub min_successful_target_state_readings: u32,
}

impl Validate for DriveConfig {
    /// # Validation Rules
    /// 1. `position_encoder_resolution` > 0
    /// 2. `motor_constant` and `gear_ratio` finite and > 0
    /// 3. `nominal_current_a` finite and >= 0
    /// 4. `max_current_a` finite and > 0
    /// 5. `drive_state_change_min_timeout_us` <= `drive_state_change_max_timeout_us`
    /// 6. `min_successful_target_state_readings` > 0
    fn validate(&self) -> Result<(), ConfigError> {
        if self.position_encoder_resolution == 0 {
            return Err(ConfigError::ValidationError(
                "position_encoder_resolution must be greater than 0".to_string(),
            ));
        }

        if !(self.motor_constant.is_finite() && self.motor_constant > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "motor_constant must be positive, got {}",
                self.motor_constant
            )));
        }

        if !(self.gear_ratio.is_finite() && self.gear_ratio > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "gear_ratio must be positive, got {}",
                self.gear_ratio
            )));
        }

        if !(self.nominal_current_a.is_finite() && self.nominal_current_a >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "nominal_current_a must be >= 0, got {}",
                self.nominal_current_a
            )));
        }

        if !(self.max_current_a.is_finite() && self.max_current_a > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "max_current_a must be positive, got {}",
                self.max_current_a
            )));
        }

        if self.drive_state_change_min_timeout_us > self.drive_state_change_max_timeout_us {
            return Err(ConfigError::ValidationError(format!(
                "drive_state_change_min_timeout_us ({}) exceeds drive_state_change_max_timeout_us ({})",
                self.drive_state_change_min_timeout_us, self.drive_state_change_max_timeout_us
            )));
        }

        if self.min_successful_target_state_readings == 0 {
            return Err(ConfigError::ValidationError(
                "min_successful_target_state_readings must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DriveConfig {
    /// Whether commands may change the mode of operation at runtime.
    #[inline]
    pub fn allows_mode_change(&self) -> bool {
        self.use_multiple_modes_of_operation
            && self.rx_pdo_type == RxPdoType::Standard
            && self.tx_pdo_type == TxPdoType::Standard
    }

    /// Torque clamp at the output [Nm].
    #[inline]
    pub fn max_torque_nm(&self) -> f64 {
        self.max_current_a * self.motor_constant * self.gear_ratio
    }

    #[inline]
    pub fn sdo_verify_timeout(&self) -> Duration {
        Duration::from_micros(self.config_run_sdo_verify_timeout_us)
    }

    #[inline]
    pub fn state_change_min_timeout(&self) -> Duration {
        Duration::from_micros(self.drive_state_change_min_timeout_us)
    }

    #[inline]
    pub fn state_change_max_timeout(&self) -> Duration {
        Duration::from_micros(self.drive_state_change_max_timeout_us)
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            rx_pdo_type: RxPdoType::Na,
            tx_pdo_type: TxPdoType::Na,
            mode_of_operation: ModeOfOperation::Na,
            use_multiple_modes_of_operation: false,
            use_raw_commands: false,
            position_encoder_resolution: 4096,
            motor_constant: 1.0,
            gear_ratio: 1.0,
            nominal_current_a: 0.0,
            max_current_a: 1.0,
            config_run_sdo_verify_timeout_us: DEFAULT_SDO_VERIFY_TIMEOUT_US,
            drive_state_change_min_timeout_us: DEFAULT_STATE_CHANGE_MIN_TIMEOUT_US,
            drive_state_change_max_timeout_us: DEFAULT_STATE_CHANGE_MAX_TIMEOUT_US,
            min_successful_target_state_readings: DEFAULT_MIN_TARGET_STATE_READINGS,
        }
    }
}
