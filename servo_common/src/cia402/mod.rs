//! CiA 402 device profile: drive states, control/status words, modes.

pub mod mode;
pub mod state;
pub mod words;

pub use mode::ModeOfOperation;
pub use state::{DriveState, StateTransition, TransitionError, next_transition, transitions_for};
pub use words::{ControlWord, StatusWord};
