//! # Servo Drive
//!
//! Lifecycle controller for a CiA 402 servo drive on a cyclic fieldbus.
//!
//! A [`Drive`] exchanges one telemetry frame and one command frame per bus
//! cycle, stages user commands in physical units and brings the drive
//! through the CiA 402 state machine either synchronously over SDO (startup
//! and shutdown) or asynchronously over the cyclic write path.
//!
//! ## Modules
//!
//! - [`drive`] - `Drive`: configuration, staging, cyclic read/write, PDO state requests
//! - [`sdo`] - Bring-up, PDO mapping, shutdown and SDO state transitions
//! - [`lifecycle`] - Pure PDO state change negotiation
//! - [`sim`] - In-process simulated fieldbus
//! - [`error`] - `DriveError`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use servo_common::prelude::*;
//! use servo_drive::Drive;
//! use servo_drive::sim::{SimulatedBus, SimulatedDevice};
//!
//! # fn main() -> Result<(), servo_drive::DriveError> {
//! let bus = Arc::new(SimulatedBus::new().with_device(1, SimulatedDevice::new(2_000)));
//! let config = DriveConfig::from_toml_str(r#"
//!     rx_pdo_type = "csp"
//!     tx_pdo_type = "csp"
//!     mode_of_operation = "cyclic_sync_position"
//!     position_encoder_resolution = 4096
//!     max_current_a = 4.0
//! "#)?;
//! let drive = Drive::new("joint_1", 1, bus, config)?;
//! drive.startup()?;
//! drive.set_drive_state_via_pdo(DriveState::OperationEnabled, false)?;
//! loop {
//!     drive.update_read()?;
//!     drive.update_write()?;
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod drive;
pub mod error;
pub mod lifecycle;
pub mod sdo;
pub mod sim;

pub use drive::Drive;
pub use error::{DriveError, DriveResult};
pub use lifecycle::{PdoStateMachine, StateChangePolicy, StepOutcome};
