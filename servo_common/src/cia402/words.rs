//! CiA 402 control word (0x6040) and status word (0x6041) bitfields.

use bitflags::bitflags;

use super::state::DriveState;

bitflags! {
    /// Control word written to the drive every cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlWord: u16 {
        /// 0 Switch on.
        const SWITCH_ON        = 0x0001;
        /// 1 Enable voltage.
        const ENABLE_VOLTAGE   = 0x0002;
        /// 2 Quick stop (active low).
        const QUICK_STOP       = 0x0004;
        /// 3 Enable operation.
        const ENABLE_OPERATION = 0x0008;
        /// 4 Operation mode specific.
        const OP_SPECIFIC_0    = 0x0010;
        /// 5 Operation mode specific.
        const OP_SPECIFIC_1    = 0x0020;
        /// 6 Operation mode specific.
        const OP_SPECIFIC_2    = 0x0040;
        /// 7 Fault reset (rising edge).
        const FAULT_RESET      = 0x0080;
        /// 8 Halt.
        const HALT             = 0x0100;
        /// 9 Operation mode specific.
        const OP_SPECIFIC_3    = 0x0200;
    }
}

impl ControlWord {
    /// Bits owned by the device state machine.
    pub const STATE_MASK: Self = Self::from_bits_truncate(
        Self::SWITCH_ON.bits()
            | Self::ENABLE_VOLTAGE.bits()
            | Self::QUICK_STOP.bits()
            | Self::ENABLE_OPERATION.bits()
            | Self::FAULT_RESET.bits(),
    );

    /// Bits owned by the active mode of operation.
    pub const MODE_MASK: Self = Self::from_bits_truncate(
        Self::OP_SPECIFIC_0.bits()
            | Self::OP_SPECIFIC_1.bits()
            | Self::OP_SPECIFIC_2.bits()
            | Self::HALT.bits()
            | Self::OP_SPECIFIC_3.bits(),
    );

    /// "Shutdown" command (transitions 2, 6, 8).
    pub const SHUTDOWN: Self = Self::from_bits_truncate(0x0006);
    /// "Switch on" command (transition 3) and "disable operation" (transition 5).
    pub const SWITCH_ON_CMD: Self = Self::from_bits_truncate(0x0007);
    /// "Enable operation" command (transition 4).
    pub const ENABLE_OPERATION_CMD: Self = Self::from_bits_truncate(0x000F);
    /// "Disable voltage" command (transitions 7, 9, 10, 12).
    pub const DISABLE_VOLTAGE: Self = Self::from_bits_truncate(0x0000);
    /// "Quick stop" command (transition 11).
    pub const QUICK_STOP_CMD: Self = Self::from_bits_truncate(0x0002);
    /// "Fault reset" command (transition 15).
    pub const FAULT_RESET_CMD: Self = Self::from_bits_truncate(0x0080);

    /// Build from the raw wire value, keeping unknown bits.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    /// Raw wire value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.bits()
    }

    /// Combine the state bits of `self` with the mode-specific bits of `mode_bits`.
    #[inline]
    pub fn with_mode_bits(self, mode_bits: Self) -> Self {
        (self & Self::STATE_MASK) | (mode_bits & Self::MODE_MASK)
    }
}

bitflags! {
    /// Status word read from the drive every cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusWord: u16 {
        /// 0 Ready to switch on.
        const READY_TO_SWITCH_ON = 0x0001;
        /// 1 Switched on.
        const SWITCHED_ON        = 0x0002;
        /// 2 Operation enabled.
        const OPERATION_ENABLED  = 0x0004;
        /// 3 Fault.
        const FAULT              = 0x0008;
        /// 4 Voltage enabled.
        const VOLTAGE_ENABLED    = 0x0010;
        /// 5 Quick stop (active low).
        const QUICK_STOP         = 0x0020;
        /// 6 Switch on disabled.
        const SWITCH_ON_DISABLED = 0x0040;
        /// 7 Warning.
        const WARNING            = 0x0080;
        /// 9 Remote.
        const REMOTE             = 0x0200;
        /// 10 Target reached.
        const TARGET_REACHED     = 0x0400;
        /// 11 Internal limit active.
        const INTERNAL_LIMIT     = 0x0800;
    }
}

impl StatusWord {
    /// Build from the raw wire value, keeping unknown bits.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    /// Raw wire value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.bits()
    }

    /// Drive state encoded in the status word.
    #[inline]
    pub const fn drive_state(self) -> DriveState {
        DriveState::from_statusword(self.bits())
    }

    /// Whether the drive reports a warning.
    #[inline]
    pub const fn has_warning(self) -> bool {
        self.contains(Self::WARNING)
    }

    /// Whether the drive reports a fault (including fault reaction active).
    #[inline]
    pub const fn has_fault(self) -> bool {
        self.contains(Self::FAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_patterns() {
        assert_eq!(ControlWord::SHUTDOWN.raw(), 0x0006);
        assert_eq!(ControlWord::SWITCH_ON_CMD.raw(), 0x0007);
        assert_eq!(ControlWord::ENABLE_OPERATION_CMD.raw(), 0x000F);
        assert_eq!(ControlWord::DISABLE_VOLTAGE.raw(), 0x0000);
        assert_eq!(ControlWord::QUICK_STOP_CMD.raw(), 0x0002);
        assert_eq!(ControlWord::FAULT_RESET_CMD.raw(), 0x0080);
    }

    #[test]
    fn test_with_mode_bits_keeps_state_bits() {
        let cw = ControlWord::ENABLE_OPERATION_CMD.with_mode_bits(ControlWord::HALT | ControlWord::SWITCH_ON);
        assert_eq!(cw.raw(), 0x010F);
    }

    #[test]
    fn test_raw_round_trip_keeps_unknown_bits() {
        let sw = StatusWord::from_raw(0xF437);
        assert_eq!(sw.raw(), 0xF437);
        let cw = ControlWord::from_raw(0x8C0F);
        assert_eq!(cw.raw(), 0x8C0F);
    }

    #[test]
    fn test_statusword_flags() {
        let sw = StatusWord::from_raw(0x0088);
        assert!(sw.has_fault());
        assert!(sw.has_warning());
        assert_eq!(sw.drive_state(), DriveState::Fault);
    }
}
