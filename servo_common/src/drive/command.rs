//! User commands and their staged wire representation.

use serde::{Deserialize, Serialize};

use super::scaling::Scaling;
use crate::cia402::{ControlWord, ModeOfOperation};

/// Command in physical units.
///
/// Only the fields used by the configured frame variant reach the wire.
/// `mode == Na` leaves the active mode of operation untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    /// [rad]
    pub target_position: f64,
    /// [rad]
    pub position_offset: f64,
    /// [rad/s]
    pub target_velocity: f64,
    /// [rad/s]
    pub velocity_offset: f64,
    /// [Nm]
    pub target_torque: f64,
    /// [Nm]
    pub torque_offset: f64,
    /// [rad/s²]
    pub profile_acceleration: f64,
    /// [rad/s²]
    pub profile_deceleration: f64,
    /// Motion profile type (0x6086), passed through unscaled.
    pub motion_profile_type: i16,
    pub mode: ModeOfOperation,
    /// Request the halt bit in the control word.
    pub halt: bool,
}

impl Command {
    /// Empty command requesting `mode`.
    pub fn with_mode(mode: ModeOfOperation) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Command converted to wire units, consumed by every write cycle until
/// superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagedCommand {
    pub target_position: i32,
    pub position_offset: i32,
    pub target_velocity: i32,
    pub velocity_offset: i32,
    pub target_torque: i16,
    pub torque_offset: i16,
    pub profile_acceleration: u32,
    pub profile_deceleration: u32,
    pub motion_profile_type: i16,
    /// Mode requested by the command.
    pub mode: ModeOfOperation,
    /// Mode-specific control word bits.
    pub control_bits: ControlWord,
}

impl StagedCommand {
    /// Convert `command` with `scaling`, clamping torques to the configured maxima.
    pub fn stage(command: &Command, scaling: &Scaling) -> Self {
        let control_bits = if command.halt {
            ControlWord::HALT
        } else {
            ControlWord::empty()
        };

        Self {
            target_position: scaling.position_to_wire(command.target_position),
            position_offset: scaling.position_to_wire(command.position_offset),
            target_velocity: scaling.velocity_to_wire(command.target_velocity),
            velocity_offset: scaling.velocity_to_wire(command.velocity_offset),
            target_torque: scaling.torque_to_wire(command.target_torque),
            torque_offset: scaling.torque_to_wire(command.torque_offset),
            profile_acceleration: scaling.accel_to_wire(command.profile_acceleration),
            profile_deceleration: scaling.accel_to_wire(command.profile_deceleration),
            motion_profile_type: command.motion_profile_type,
            mode: command.mode,
            control_bits,
        }
    }
}
