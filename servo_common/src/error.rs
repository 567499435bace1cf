//! Error flags accumulated into drive readings.
//!
//! Conditions raised by the cyclic engine, command staging and the lifecycle
//! controller are OR-ed into the reading of the drive. Flags are never cleared
//! automatically; a caller clears them explicitly after handling.

use bitflags::bitflags;

bitflags! {
    /// Drive error flags.
    ///
    /// FATAL flags (drive cannot exchange process data): RX_PDO_TYPE, TX_PDO_TYPE, CONFIGURATION.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriveErrorFlags: u16 {
        /// Hardware bring-up failed. **FATAL**.
        const CONFIGURATION        = 0x0001;
        /// Write attempted without a resolved mode of operation, or a
        /// mode change was rejected for the active configuration.
        const MODE_OF_OPERATION    = 0x0002;
        /// Unsupported or mismatched write-direction frame. **FATAL**.
        const RX_PDO_TYPE          = 0x0004;
        /// Unsupported or mismatched read-direction frame. **FATAL**.
        const TX_PDO_TYPE          = 0x0008;
        /// SDO state transition failed or had no mapping.
        const SDO_STATE_TRANSITION = 0x0010;
        /// PDO state change had no mapping or timed out.
        const PDO_STATE_TRANSITION = 0x0020;
    }
}

impl DriveErrorFlags {
    /// Mask of all FATAL flags.
    pub const FATAL_MASK: Self = Self::from_bits_truncate(
        Self::CONFIGURATION.bits() | Self::RX_PDO_TYPE.bits() | Self::TX_PDO_TYPE.bits(),
    );

    /// Returns true if any FATAL flag is set.
    #[inline]
    pub const fn has_fatal(&self) -> bool {
        self.intersects(Self::FATAL_MASK)
    }
}

impl Default for DriveErrorFlags {
    fn default() -> Self {
        Self::empty()
    }
}
