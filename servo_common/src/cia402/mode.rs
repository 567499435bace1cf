//! Modes of operation (0x6060 / 0x6061).

use serde::{Deserialize, Serialize};

/// Mode of operation written with every command frame.
///
/// `Na` means "not resolved"; the cyclic write refuses to run with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum ModeOfOperation {
    Na = 0,
    ProfilePosition = 1,
    ProfileVelocity = 3,
    Homing = 6,
    CyclicSyncPosition = 8,
    CyclicSyncVelocity = 9,
    CyclicSyncTorque = 10,
}

impl ModeOfOperation {
    /// Convert from the raw wire value. Returns `None` for unknown modes.
    #[inline]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::Na),
            1 => Some(Self::ProfilePosition),
            3 => Some(Self::ProfileVelocity),
            6 => Some(Self::Homing),
            8 => Some(Self::CyclicSyncPosition),
            9 => Some(Self::CyclicSyncVelocity),
            10 => Some(Self::CyclicSyncTorque),
            _ => None,
        }
    }

    /// Raw wire value.
    #[inline]
    pub const fn raw(self) -> i8 {
        self as i8
    }

    /// Whether a mode has been resolved.
    #[inline]
    pub const fn is_resolved(self) -> bool {
        !matches!(self, Self::Na)
    }
}

impl Default for ModeOfOperation {
    fn default() -> Self {
        Self::Na
    }
}
