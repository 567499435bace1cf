//! Servo Common Library
//!
//! Shared types for driving a CiA 402 servo drive over a cyclic fieldbus.
//! Everything here is free of locking and I/O so it can be reused by the
//! drive controller, by bus simulators and by tests.
//!
//! # Module Structure
//!
//! - [`cia402`] - Drive state machine: states, control/status words, transitions
//! - [`drive`] - Drive configuration, unit scaling, PDO frames, commands, readings
//! - [`config`] - TOML configuration loading
//! - [`error`] - Accumulated error flags reported through readings
//! - [`consts`] - Workspace-wide limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use servo_common::prelude::*;
//!
//! let state = DriveState::from_statusword(0x0027);
//! assert_eq!(state, DriveState::OperationEnabled);
//! ```

pub mod cia402;
pub mod config;
pub mod consts;
pub mod drive;
pub mod error;
pub mod prelude;
