//! Fieldbus master contract.
//!
//! The drive never talks to hardware directly. Every SDO transaction, PDO
//! exchange and bus state change goes through a [`Fieldbus`] implementation,
//! which is how the controller runs unchanged against real masters and the
//! in-process simulator.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`: the cyclic exchange runs on the bus
//! scheduler thread while SDO transactions are issued from caller threads.

use core::fmt;
use std::time::Duration;
use thiserror::Error;

use super::od::OdAddress;

/// Bus (EtherCAT-style) slave state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusState {
    Init,
    PreOp,
    Boot,
    SafeOp,
    Op,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::PreOp => "PRE-OP",
            Self::Boot => "BOOT",
            Self::SafeOp => "SAFE-OP",
            Self::Op => "OP",
        };
        f.write_str(name)
    }
}

/// Errors reported by a fieldbus master.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    /// Slave did not reach a bus state in time.
    #[error("slave {address} did not reach {state} in time")]
    StateTimeout { address: u16, state: BusState },

    /// Bus state change rejected.
    #[error("bus state change failed: {0}")]
    StateChange(String),

    /// SDO transaction aborted by the slave or the master.
    #[error("SDO 0x{index:04X}:{sub} failed: {reason}")]
    Sdo { index: u16, sub: u8, reason: String },

    /// SDO upload returned fewer bytes than the value requires.
    #[error("SDO 0x{index:04X}:{sub} returned {got} bytes, expected {expected}")]
    ShortRead {
        index: u16,
        sub: u8,
        expected: usize,
        got: usize,
    },

    /// SDO read-back differs from the value written.
    #[error("SDO 0x{index:04X}:{sub} verification failed: wrote {written}, read {read}")]
    VerifyMismatch {
        index: u16,
        sub: u8,
        written: String,
        read: String,
    },

    /// Process data exchange failed.
    #[error("PDO exchange failed: {0}")]
    Pdo(String),
}

/// Fieldbus master used by a drive.
pub trait Fieldbus: Send + Sync {
    /// Block until slave `address` reports `state`, polling every `poll`.
    fn wait_for_state(
        &self,
        state: BusState,
        address: u16,
        poll: Duration,
        timeout: Duration,
    ) -> Result<(), BusError>;

    /// Request bus state `state` for slave `address`.
    fn set_state(&self, state: BusState, address: u16) -> Result<(), BusError>;

    /// SDO upload into `buf`. Returns the number of bytes received.
    fn sdo_read(
        &self,
        address: u16,
        object: OdAddress,
        complete_access: bool,
        buf: &mut [u8],
    ) -> Result<usize, BusError>;

    /// SDO download of `data`.
    fn sdo_write(
        &self,
        address: u16,
        object: OdAddress,
        complete_access: bool,
        data: &[u8],
    ) -> Result<(), BusError>;

    /// Stage the outgoing (write-direction) process data of slave `address`.
    fn write_rx_pdo(&self, address: u16, data: &[u8]) -> Result<(), BusError>;

    /// Copy the latest incoming (read-direction) process data into `buf`.
    fn read_tx_pdo(&self, address: u16, buf: &mut [u8]) -> Result<(), BusError>;

    /// Process data sizes `(rx, tx)` in bytes as configured in the slave.
    fn hardware_pdo_sizes(&self, address: u16) -> (u16, u16);
}

// ─── Typed SDO Access ───────────────────────────────────────────────

/// Fixed-size little-endian value carried in SDO transfers and PDO frames.
pub trait WireValue: Copy + PartialEq + fmt::Debug + Send + 'static {
    const SIZE: usize;

    /// Write the value into `buf[..SIZE]`.
    fn write_le(self, buf: &mut [u8]);

    /// Read the value from `buf[..SIZE]`.
    fn read_le(buf: &[u8]) -> Self;
}

macro_rules! impl_wire_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn write_le(self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; core::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_wire_value!(u8, i8, u16, i16, u32, i32);

/// Typed helpers on top of the byte-oriented SDO calls.
pub trait FieldbusExt: Fieldbus {
    /// Read a typed value.
    fn read_sdo<T: WireValue>(&self, address: u16, object: OdAddress) -> Result<T, BusError> {
        let mut buf = [0u8; 8];
        let got = self.sdo_read(address, object, false, &mut buf[..T::SIZE])?;
        if got < T::SIZE {
            return Err(BusError::ShortRead {
                index: object.index,
                sub: object.sub,
                expected: T::SIZE,
                got,
            });
        }
        Ok(T::read_le(&buf))
    }

    /// Write a typed value.
    fn write_sdo<T: WireValue>(
        &self,
        address: u16,
        object: OdAddress,
        value: T,
    ) -> Result<(), BusError> {
        let mut buf = [0u8; 8];
        value.write_le(&mut buf);
        self.sdo_write(address, object, false, &buf[..T::SIZE])
    }

    /// Write a typed value, wait `verify_delay`, read it back and compare.
    fn write_sdo_verified<T: WireValue>(
        &self,
        address: u16,
        object: OdAddress,
        value: T,
        verify_delay: Duration,
    ) -> Result<(), BusError> {
        self.write_sdo(address, object, value)?;
        std::thread::sleep(verify_delay);
        let read: T = self.read_sdo(address, object)?;
        if read != value {
            return Err(BusError::VerifyMismatch {
                index: object.index,
                sub: object.sub,
                written: format!("{value:?}"),
                read: format!("{read:?}"),
            });
        }
        Ok(())
    }
}

impl<B: Fieldbus + ?Sized> FieldbusExt for B {}
