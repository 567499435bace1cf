//! Error types for drive operations.
//!
//! Every failing operation also ORs the matching [`DriveErrorFlags`] into the
//! drive reading; the returned error carries the detail for the caller.

use servo_common::cia402::{DriveState, ModeOfOperation, TransitionError};
use servo_common::config::ConfigError;
use servo_common::drive::{BusError, FrameError, RxPdoType, TxPdoType};
use servo_common::error::DriveErrorFlags;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`crate::Drive`] operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriveError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: ConfigError,
    },

    /// Fieldbus transaction failed
    #[error("Fieldbus error: {source}")]
    Bus {
        /// Source fieldbus error
        #[from]
        source: BusError,
    },

    /// PDO frame could not be built or parsed
    #[error("Frame error: {source}")]
    Frame {
        /// Source frame error
        #[from]
        source: FrameError,
    },

    /// Hardware bring-up failed
    #[error("Startup of drive '{name}' failed: {reason}")]
    Startup {
        /// Drive name
        name: String,
        /// What failed
        reason: String,
    },

    /// Write attempted without a resolved mode of operation
    #[error("Mode of operation has not been set")]
    ModeNotSet,

    /// Command frame layout not configured or larger than the slave's frame
    #[error("Unsupported command frame {variant:?} (slave frame {hw_size} bytes)")]
    UnsupportedRxFrame {
        /// Configured layout
        variant: RxPdoType,
        /// Cached slave frame size
        hw_size: usize,
    },

    /// Telemetry frame layout not configured or larger than the slave's frame
    #[error("Unsupported telemetry frame {variant:?} (slave frame {hw_size} bytes)")]
    UnsupportedTxFrame {
        /// Configured layout
        variant: TxPdoType,
        /// Cached slave frame size
        hw_size: usize,
    },

    /// Command requested a mode change the configuration does not allow
    #[error("Mode change from {active:?} to {requested:?} rejected")]
    ModeChangeRejected {
        /// Mode kept active
        active: ModeOfOperation,
        /// Mode requested by the command
        requested: ModeOfOperation,
    },

    /// No control word path to the requested state
    #[error("State transition error: {source}")]
    Transition {
        /// Source lookup error
        #[from]
        source: TransitionError,
    },

    /// PDO state change did not complete in time
    #[error("Drive did not reach '{target}' within {timeout:?} (last seen '{last}')")]
    StateChangeTimeout {
        /// Requested state
        target: DriveState,
        /// Last decoded state
        last: DriveState,
        /// Configured maximum
        timeout: Duration,
    },
}

impl DriveError {
    /// Reading flag that accompanies this error.
    pub fn flag(&self) -> DriveErrorFlags {
        match self {
            Self::Config { .. } | Self::Startup { .. } => DriveErrorFlags::CONFIGURATION,
            Self::ModeNotSet | Self::ModeChangeRejected { .. } => DriveErrorFlags::MODE_OF_OPERATION,
            Self::UnsupportedRxFrame { .. } => DriveErrorFlags::RX_PDO_TYPE,
            Self::UnsupportedTxFrame { .. } => DriveErrorFlags::TX_PDO_TYPE,
            Self::Bus { .. } | Self::Frame { .. } | Self::Transition { .. } => {
                DriveErrorFlags::SDO_STATE_TRANSITION
            }
            Self::StateChangeTimeout { .. } => DriveErrorFlags::PDO_STATE_TRANSITION,
        }
    }
}

/// Result type for drive operations
pub type DriveResult<T> = Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: DriveError = ConfigError::FileNotFound("joint_1.toml".into()).into();
        assert_eq!(err.flag(), DriveErrorFlags::CONFIGURATION);

        let err: DriveError = TransitionError::NoMapping {
            current: DriveState::SwitchedOn,
            requested: DriveState::Fault,
        }
        .into();
        assert!(err.to_string().contains("no state transition"));
    }

    #[test]
    fn test_timeout_message() {
        let err = DriveError::StateChangeTimeout {
            target: DriveState::OperationEnabled,
            last: DriveState::SwitchedOn,
            timeout: Duration::from_millis(300),
        };
        assert_eq!(
            err.to_string(),
            "Drive did not reach 'operation enabled' within 300ms (last seen 'switched on')"
        );
        assert_eq!(err.flag(), DriveErrorFlags::PDO_STATE_TRANSITION);
    }
}
