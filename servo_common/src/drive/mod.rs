//! Drive-side data model: configuration, object dictionary, fieldbus
//! contract, unit scaling, PDO frames, commands and readings.

pub mod bus;
pub mod command;
pub mod config;
pub mod od;
pub mod pdo;
pub mod reading;
pub mod scaling;

pub use bus::{BusError, BusState, Fieldbus, FieldbusExt, WireValue};
pub use command::{Command, StagedCommand};
pub use config::{DriveConfig, RxPdoType, TxPdoType};
pub use od::OdAddress;
pub use pdo::{FrameBuf, FrameError, RxFrame, TxFrame};
pub use reading::{RawTelemetry, Reading, fault_description};
pub use scaling::Scaling;
