//! CiA 402 drive states and the transition table between them.
//!
//! The table is a fixed lookup keyed by `(current, requested)`. Each entry is
//! the ordered list of transitions that walks the drive from `current` to
//! `requested`. Callers either apply the whole list in one burst (SDO channel)
//! or only its first hop per cycle (PDO channel).

use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::words::ControlWord;

// ─── Drive State ────────────────────────────────────────────────────

/// Drive state decoded from the status word.
///
/// "Not ready to switch on" and unknown patterns decode to `SwitchOnDisabled`;
/// "fault reaction active" decodes to `Fault`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriveState {
    SwitchOnDisabled = 0,
    ReadyToSwitchOn = 1,
    SwitchedOn = 2,
    OperationEnabled = 3,
    QuickStopActive = 4,
    Fault = 5,
}

impl DriveState {
    /// All states, in table order.
    pub const ALL: [Self; 6] = [
        Self::SwitchOnDisabled,
        Self::ReadyToSwitchOn,
        Self::SwitchedOn,
        Self::OperationEnabled,
        Self::QuickStopActive,
        Self::Fault,
    ];

    /// Decode a raw status word.
    pub const fn from_statusword(raw: u16) -> Self {
        match raw & 0x004F {
            0x0008 | 0x000F => return Self::Fault,
            0x0040 => return Self::SwitchOnDisabled,
            _ => {}
        }
        match raw & 0x006F {
            0x0021 => Self::ReadyToSwitchOn,
            0x0023 => Self::SwitchedOn,
            0x0027 => Self::OperationEnabled,
            0x0007 => Self::QuickStopActive,
            _ if raw & 0x0008 != 0 => Self::Fault,
            _ => Self::SwitchOnDisabled,
        }
    }

    /// Whether the drive can be driven towards this state with a control word.
    #[inline]
    pub const fn is_requestable(self) -> bool {
        !matches!(self, Self::Fault)
    }
}

impl Default for DriveState {
    fn default() -> Self {
        Self::SwitchOnDisabled
    }
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SwitchOnDisabled => "switch on disabled",
            Self::ReadyToSwitchOn => "ready to switch on",
            Self::SwitchedOn => "switched on",
            Self::OperationEnabled => "operation enabled",
            Self::QuickStopActive => "quick stop active",
            Self::Fault => "fault",
        };
        f.write_str(name)
    }
}

// ─── State Transition ───────────────────────────────────────────────

/// Device-profile transitions reachable by writing a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateTransition {
    T2 = 2,
    T3 = 3,
    T4 = 4,
    T5 = 5,
    T6 = 6,
    T7 = 7,
    T8 = 8,
    T9 = 9,
    T10 = 10,
    T11 = 11,
    T12 = 12,
    T15 = 15,
}

impl StateTransition {
    /// Numeric id of the transition in the device profile.
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Control word that triggers the transition.
    pub const fn control_word(self) -> ControlWord {
        match self {
            Self::T2 | Self::T6 | Self::T8 => ControlWord::SHUTDOWN,
            Self::T3 | Self::T5 => ControlWord::SWITCH_ON_CMD,
            Self::T4 => ControlWord::ENABLE_OPERATION_CMD,
            Self::T7 | Self::T9 | Self::T10 | Self::T12 => ControlWord::DISABLE_VOLTAGE,
            Self::T11 => ControlWord::QUICK_STOP_CMD,
            Self::T15 => ControlWord::FAULT_RESET_CMD,
        }
    }

    /// `(from, to)` states of the edge.
    pub const fn edge(self) -> (DriveState, DriveState) {
        use DriveState::*;
        match self {
            Self::T2 => (SwitchOnDisabled, ReadyToSwitchOn),
            Self::T3 => (ReadyToSwitchOn, SwitchedOn),
            Self::T4 => (SwitchedOn, OperationEnabled),
            Self::T5 => (OperationEnabled, SwitchedOn),
            Self::T6 => (SwitchedOn, ReadyToSwitchOn),
            Self::T7 => (ReadyToSwitchOn, SwitchOnDisabled),
            Self::T8 => (OperationEnabled, ReadyToSwitchOn),
            Self::T9 => (OperationEnabled, SwitchOnDisabled),
            Self::T10 => (SwitchedOn, SwitchOnDisabled),
            Self::T11 => (OperationEnabled, QuickStopActive),
            Self::T12 => (QuickStopActive, SwitchOnDisabled),
            Self::T15 => (Fault, SwitchOnDisabled),
        }
    }
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transition {}", self.id())
    }
}

// ─── Transition Table ───────────────────────────────────────────────

/// Transition lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The drive is already in the requested state.
    #[error("drive state '{0}' has already been reached")]
    AlreadyReached(DriveState),

    /// No control word leads from `current` to `requested`.
    #[error("no state transition from '{current}' to '{requested}'")]
    NoMapping {
        current: DriveState,
        requested: DriveState,
    },
}

use self::StateTransition::*;

/// `PATHS[current][requested]`; `None` where `requested` cannot be commanded.
const PATHS: [[Option<&[StateTransition]>; 6]; 6] = [
    // current: SwitchOnDisabled
    [Some(&[]), Some(&[T2]), Some(&[T2, T3]), Some(&[T2, T3, T4]), Some(&[T2, T3, T4, T11]), None],
    // current: ReadyToSwitchOn
    [Some(&[T7]), Some(&[]), Some(&[T3]), Some(&[T3, T4]), Some(&[T3, T4, T11]), None],
    // current: SwitchedOn
    [Some(&[T10]), Some(&[T6]), Some(&[]), Some(&[T4]), Some(&[T4, T11]), None],
    // current: OperationEnabled
    [Some(&[T9]), Some(&[T8]), Some(&[T5]), Some(&[]), Some(&[T11]), None],
    // current: QuickStopActive
    [Some(&[T12]), Some(&[T12, T2]), Some(&[T12, T2, T3]), Some(&[T12, T2, T3, T4]), Some(&[]), None],
    // current: Fault
    [
        Some(&[T15]),
        Some(&[T15, T2]),
        Some(&[T15, T2, T3]),
        Some(&[T15, T2, T3, T4]),
        Some(&[T15, T2, T3, T4, T11]),
        None,
    ],
];

/// Ordered transitions leading from `current` to `requested`.
///
/// Returns an empty slice when `current == requested` and `None` when
/// `requested` is not reachable through control words (`Fault`).
#[inline]
pub const fn transitions_for(
    current: DriveState,
    requested: DriveState,
) -> Option<&'static [StateTransition]> {
    PATHS[current as usize][requested as usize]
}

/// First transition to apply on the way from `current` to `requested`.
pub fn next_transition(
    current: DriveState,
    requested: DriveState,
) -> Result<StateTransition, TransitionError> {
    match transitions_for(current, requested) {
        None => Err(TransitionError::NoMapping { current, requested }),
        Some([]) => Err(TransitionError::AlreadyReached(current)),
        Some([first, ..]) => Ok(*first),
    }
}
