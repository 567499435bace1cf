//! Prelude module for convenient imports.
//!
//! ```rust
//! use servo_common::prelude::*;
//! ```

pub use crate::cia402::{
    ControlWord, DriveState, ModeOfOperation, StateTransition, StatusWord, TransitionError,
    next_transition, transitions_for,
};
pub use crate::config::{ConfigError, ConfigLoader, Validate};
pub use crate::consts::*;
pub use crate::drive::{
    BusError, BusState, Command, DriveConfig, Fieldbus, FieldbusExt, FrameBuf, FrameError,
    OdAddress, Reading, RxFrame, RxPdoType, Scaling, StagedCommand, TxFrame, TxPdoType,
    WireValue,
};
pub use crate::error::DriveErrorFlags;
