//! Workspace-wide constants.
//!
//! Single source of truth for frame limits and timing defaults.

/// Largest PDO frame (either direction) the drive will exchange, in bytes.
pub const MAX_PDO_BYTES: usize = 64;

/// Longest CiA 402 transition path between two drive states.
pub const MAX_TRANSITION_PATH: usize = 5;

/// Poll interval used while waiting for the bus to reach PRE-OP.
pub const PRE_OP_POLL_INTERVAL_MS: u64 = 50;

/// Timeout used while waiting for the bus to reach PRE-OP.
pub const PRE_OP_TIMEOUT_MS: u64 = 50;

/// Settle delay after the bus reports PRE-OP and after a completed bring-up.
pub const STARTUP_SETTLE_MS: u64 = 100;

/// Default delay between an SDO write and its read-back verification.
pub const DEFAULT_SDO_VERIFY_TIMEOUT_US: u64 = 20_000;

/// Default minimum dwell between two control word changes on the PDO channel.
pub const DEFAULT_STATE_CHANGE_MIN_TIMEOUT_US: u64 = 20_000;

/// Default overall timeout of a PDO state change.
pub const DEFAULT_STATE_CHANGE_MAX_TIMEOUT_US: u64 = 300_000;

/// Default number of consecutive reads confirming the target state.
pub const DEFAULT_MIN_TARGET_STATE_READINGS: u32 = 10;

/// Upper bound on the poll interval of a blocking PDO state change wait.
pub const STATE_CHANGE_POLL_INTERVAL_US: u64 = 1_000;
