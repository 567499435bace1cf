//! Telemetry snapshot of a drive.

use std::time::Instant;

use super::pdo::TxFrame;
use super::scaling::Scaling;
use crate::cia402::{DriveState, StatusWord};
use crate::error::DriveErrorFlags;

/// Wire values of the last decoded telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTelemetry {
    pub statusword: u16,
    pub position: i32,
    pub velocity: i32,
    pub torque: i16,
    pub velocity_demand: i32,
}

/// Latest telemetry of a drive plus its accumulated error flags.
///
/// Readers get copies; only the cyclic read updates it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub statusword: StatusWord,
    pub drive_state: DriveState,
    /// [rad]
    pub actual_position: f64,
    /// [rad/s]
    pub actual_velocity: f64,
    /// [A]
    pub actual_current: f64,
    /// [Nm], derived from the actual current.
    pub actual_torque: f64,
    /// [rad/s], profile velocity frames only.
    pub demand_velocity: f64,
    pub raw: RawTelemetry,
    /// Error code (0x603F) read when the drive entered Fault.
    pub fault_code: Option<u16>,
    /// Time of the last decoded frame.
    pub stamp: Option<Instant>,
    errors: DriveErrorFlags,
    scaling: Scaling,
}

impl Reading {
    pub fn new(scaling: Scaling) -> Self {
        Self {
            scaling,
            ..Self::default()
        }
    }

    /// Replace the scaling used for subsequent frames.
    #[inline]
    pub fn configure(&mut self, scaling: Scaling) {
        self.scaling = scaling;
    }

    #[inline]
    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// Decode `frame` into physical units.
    ///
    /// Fields absent from the frame variant keep their previous values.
    pub fn update(&mut self, frame: &TxFrame, now: Instant) {
        let statusword = frame.statusword();
        self.statusword = statusword;
        self.drive_state = statusword.drive_state();
        self.raw.statusword = statusword.raw();
        self.stamp = Some(now);

        match *frame {
            TxFrame::Standard { .. } => {}
            TxFrame::Cyclic {
                torque_actual,
                velocity_actual,
                position_actual,
                ..
            } => self.update_motion(torque_actual, velocity_actual, position_actual),
            TxFrame::Pvm {
                torque_actual,
                velocity_actual,
                position_actual,
                velocity_demand,
                ..
            } => {
                self.update_motion(torque_actual, velocity_actual, position_actual);
                self.raw.velocity_demand = velocity_demand;
                self.demand_velocity = self.scaling.velocity_from_wire(velocity_demand);
            }
        }
    }

    fn update_motion(&mut self, torque: i16, velocity: i32, position: i32) {
        self.raw.torque = torque;
        self.raw.velocity = velocity;
        self.raw.position = position;
        self.actual_current = self.scaling.current_from_wire(torque);
        self.actual_torque = self.scaling.torque_from_wire(torque);
        self.actual_velocity = self.scaling.velocity_from_wire(velocity);
        self.actual_position = self.scaling.position_from_wire(position);
    }

    // ─── Error Sink ─────────────────────────────────────────────────

    #[inline]
    pub fn add_error(&mut self, flags: DriveErrorFlags) {
        self.errors |= flags;
    }

    #[inline]
    pub fn errors(&self) -> DriveErrorFlags {
        self.errors
    }

    #[inline]
    pub fn has_error(&self, flags: DriveErrorFlags) -> bool {
        self.errors.intersects(flags)
    }

    /// Clear accumulated errors and the stored fault code.
    pub fn clear_errors(&mut self) {
        self.errors = DriveErrorFlags::empty();
        self.fault_code = None;
    }

    pub fn fault_description(&self) -> Option<&'static str> {
        self.fault_code.map(fault_description)
    }
}

/// Human-readable text for a CiA 301/402 error code.
pub fn fault_description(code: u16) -> &'static str {
    match code {
        0x0000 => "no error",
        0x1000 => "generic error",
        0x2310 => "continuous overcurrent",
        0x2320 => "short circuit at outputs",
        0x3210 => "DC link overvoltage",
        0x3220 => "DC link undervoltage",
        0x4210 => "excess temperature device",
        0x4310 => "excess temperature drive",
        0x5113 => "supply low voltage",
        0x6010 => "software reset (watchdog)",
        0x6320 => "parameter error",
        0x7121 => "motor blocked",
        0x7300 => "sensor error",
        0x7320 => "position sensor error",
        0x8110 => "communication overrun",
        0x8130 => "heartbeat or life guard error",
        0x8400 => "velocity control error",
        0x8611 => "following error",
        0x8612 => "reference limit",
        0x8A00 => "communication error",
        _ => match code >> 12 {
            0x2 => "current error",
            0x3 => "voltage error",
            0x4 => "temperature error",
            0x5 => "device hardware error",
            0x6 => "device software error",
            0x7 => "additional module error",
            0x8 => "monitoring error",
            0x9 => "external error",
            0xF => "device specific error",
            _ => "unknown error",
        },
    }
}
