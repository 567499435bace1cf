//! In-process simulated fieldbus.
//!
//! `SimulatedBus` implements [`Fieldbus`] over a set of [`SimulatedDevice`]s
//! keyed by slave address, for bring-up and tests without hardware.
//!
//! ```rust
//! use servo_drive::sim::{SimulatedBus, SimulatedDevice};
//!
//! let bus = SimulatedBus::new().with_device(1, SimulatedDevice::new(2_500));
//! bus.with(1, |device| device.set_latency(2));
//! assert!(bus.with(7, |device| device.mode()).is_none());
//! ```

mod device;

pub use device::SimulatedDevice;

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use servo_common::drive::{BusError, BusState, Fieldbus, OdAddress};

/// Simulated fieldbus master.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    devices: Mutex<HashMap<u16, SimulatedDevice>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `device` at slave `address`.
    pub fn with_device(self, address: u16, device: SimulatedDevice) -> Self {
        self.devices.lock().insert(address, device);
        self
    }

    /// Run `f` on the device at `address`; `None` if no device is attached.
    pub fn with<R>(&self, address: u16, f: impl FnOnce(&mut SimulatedDevice) -> R) -> Option<R> {
        self.devices.lock().get_mut(&address).map(f)
    }

    fn device<R>(
        &self,
        address: u16,
        f: impl FnOnce(&mut SimulatedDevice) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let mut devices = self.devices.lock();
        match devices.get_mut(&address) {
            Some(device) => f(device),
            None => Err(BusError::StateChange(format!("no slave at address {address}"))),
        }
    }
}

impl Fieldbus for SimulatedBus {
    fn wait_for_state(
        &self,
        state: BusState,
        address: u16,
        poll: Duration,
        timeout: Duration,
    ) -> Result<(), BusError> {
        let start = Instant::now();
        loop {
            if self.device(address, |d| Ok(d.bus_state()))? == state {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(BusError::StateTimeout { address, state });
            }
            thread::sleep(poll.min(timeout));
        }
    }

    fn set_state(&self, state: BusState, address: u16) -> Result<(), BusError> {
        self.device(address, |d| {
            d.set_bus_state(state);
            Ok(())
        })
    }

    fn sdo_read(
        &self,
        address: u16,
        object: OdAddress,
        _complete_access: bool,
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        self.device(address, |d| d.sdo_read(object, buf))
    }

    fn sdo_write(
        &self,
        address: u16,
        object: OdAddress,
        _complete_access: bool,
        data: &[u8],
    ) -> Result<(), BusError> {
        self.device(address, |d| d.sdo_write(object, data))
    }

    fn write_rx_pdo(&self, address: u16, data: &[u8]) -> Result<(), BusError> {
        self.device(address, |d| d.write_rx_pdo(data))
    }

    fn read_tx_pdo(&self, address: u16, buf: &mut [u8]) -> Result<(), BusError> {
        self.device(address, |d| d.read_tx_pdo(buf))
    }

    fn hardware_pdo_sizes(&self, address: u16) -> (u16, u16) {
        self.devices
            .lock()
            .get(&address)
            .map(SimulatedDevice::pdo_sizes)
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_for_state() {
        let bus = SimulatedBus::new().with_device(1, SimulatedDevice::default());
        let poll = Duration::from_millis(1);
        assert!(bus.wait_for_state(BusState::PreOp, 1, poll, poll).is_ok());
        assert_eq!(
            bus.wait_for_state(BusState::Op, 1, poll, Duration::from_millis(3)),
            Err(BusError::StateTimeout {
                address: 1,
                state: BusState::Op
            })
        );
        bus.set_state(BusState::Init, 1).unwrap();
        assert_eq!(bus.with(1, |d| d.bus_state()), Some(BusState::Init));
    }

    #[test]
    fn test_unknown_address() {
        let bus = SimulatedBus::new();
        assert!(bus.set_state(BusState::Init, 9).is_err());
        assert_eq!(bus.hardware_pdo_sizes(9), (0, 0));
    }
}
