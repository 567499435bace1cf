//! Simulated CiA 402 device.
//!
//! Holds an SDO object store, derives its PDO layouts from the mapping
//! objects written during bring-up and runs the device side of the drive
//! state machine on received control words.

use std::collections::{HashMap, VecDeque};

use servo_common::cia402::{ControlWord, DriveState, StatusWord};
use servo_common::drive::od::{self, OdAddress};
use servo_common::drive::{BusError, BusState, RxFrame, RxPdoType, TxFrame, TxPdoType};
use tracing::{debug, trace};

const RX_VARIANTS: [RxPdoType; 6] = [
    RxPdoType::Standard,
    RxPdoType::Csp,
    RxPdoType::Cst,
    RxPdoType::Csv,
    RxPdoType::CstCsp,
    RxPdoType::Pvm,
];

// Csp/Cst/Csv/CstCsp share one telemetry layout; the first match wins.
const TX_VARIANTS: [TxPdoType; 3] = [TxPdoType::Standard, TxPdoType::Csp, TxPdoType::Pvm];

/// Setpoints taken from the last command frame.
#[derive(Debug, Clone, Copy, Default)]
struct Setpoints {
    position: i32,
    velocity: i32,
    torque: i16,
}

/// Device-side model of a single servo drive.
#[derive(Debug)]
pub struct SimulatedDevice {
    bus_state: BusState,
    drive_state: DriveState,
    objects: HashMap<OdAddress, Vec<u8>>,
    read_only: Vec<OdAddress>,
    rejected: Vec<OdAddress>,
    rejected_writes: usize,
    /// Control words received over PDO, applied after `latency` exchanges.
    in_flight: VecDeque<ControlWord>,
    latency: usize,
    last_controlword: ControlWord,
    applied: Vec<ControlWord>,
    setpoints: Setpoints,
    mode: i8,
    size_override: Option<(u16, u16)>,
}

impl SimulatedDevice {
    /// Device in PRE-OP and switch on disabled, reporting `nominal_current_ma`
    /// in its motor data.
    pub fn new(nominal_current_ma: u32) -> Self {
        let mut device = Self {
            bus_state: BusState::PreOp,
            drive_state: DriveState::SwitchOnDisabled,
            objects: HashMap::new(),
            read_only: Vec::new(),
            rejected: Vec::new(),
            rejected_writes: 0,
            in_flight: VecDeque::new(),
            latency: 0,
            last_controlword: ControlWord::DISABLE_VOLTAGE,
            applied: Vec::new(),
            setpoints: Setpoints::default(),
            mode: 0,
            size_override: None,
        };
        device.store(od::MOTOR_NOMINAL_CURRENT, &nominal_current_ma.to_le_bytes());
        device.store(od::ERROR_CODE, &0u16.to_le_bytes());
        device.store(od::MODES_OF_OPERATION, &[0]);
        device
    }

    // ─── Test Controls ──────────────────────────────────────────────

    /// Delay PDO control words by `exchanges` write cycles.
    pub fn set_latency(&mut self, exchanges: usize) {
        self.latency = exchanges;
    }

    /// Force the device into Fault with `code` in the error code object.
    pub fn inject_fault(&mut self, code: u16) {
        debug!(code, "simulated fault injected");
        self.drive_state = DriveState::Fault;
        self.store(od::ERROR_CODE, &code.to_le_bytes());
    }

    /// Ignore writes to `object`; reads keep returning the stored value.
    pub fn set_read_only(&mut self, object: OdAddress) {
        self.read_only.push(object);
    }

    /// Abort every SDO write to `object`.
    pub fn reject_writes(&mut self, object: OdAddress) {
        self.rejected.push(object);
    }

    /// Report fixed PDO sizes instead of the mapped ones.
    pub fn override_pdo_sizes(&mut self, rx: u16, tx: u16) {
        self.size_override = Some((rx, tx));
    }

    #[inline]
    pub fn drive_state(&self) -> DriveState {
        self.drive_state
    }

    #[inline]
    pub fn bus_state(&self) -> BusState {
        self.bus_state
    }

    /// Mode byte of the last command frame.
    #[inline]
    pub fn mode(&self) -> i8 {
        self.mode
    }

    /// Control words that changed the previously received one, in order.
    pub fn applied_controlwords(&self) -> &[ControlWord] {
        &self.applied
    }

    /// SDO writes refused through [`reject_writes`](Self::reject_writes).
    #[inline]
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes
    }

    /// Raw bytes of an object.
    pub fn object(&self, object: OdAddress) -> Option<&[u8]> {
        self.objects.get(&object).map(Vec::as_slice)
    }

    // ─── Bus Side ───────────────────────────────────────────────────

    pub(crate) fn set_bus_state(&mut self, state: BusState) {
        debug!(%state, "simulated bus state");
        self.bus_state = state;
    }

    pub(crate) fn sdo_read(&self, object: OdAddress, buf: &mut [u8]) -> Result<usize, BusError> {
        let bytes: Vec<u8> = match object {
            od::STATUSWORD => self.statusword().raw().to_le_bytes().to_vec(),
            _ => self
                .objects
                .get(&object)
                .cloned()
                .ok_or_else(|| sdo_error(object, "object does not exist"))?,
        };
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    pub(crate) fn sdo_write(&mut self, object: OdAddress, data: &[u8]) -> Result<(), BusError> {
        if self.rejected.contains(&object) {
            self.rejected_writes += 1;
            return Err(sdo_error(object, "write rejected"));
        }
        if object == od::STATUSWORD {
            return Err(sdo_error(object, "object is read only"));
        }
        if object == od::CONTROLWORD {
            let raw = u16::from_le_bytes(le_array(object, data)?);
            self.receive_controlword(ControlWord::from_raw(raw));
        }
        if !self.read_only.contains(&object) {
            self.store(object, data);
        }
        Ok(())
    }

    pub(crate) fn pdo_sizes(&self) -> (u16, u16) {
        self.size_override.unwrap_or_else(|| {
            (
                self.mapped_bits(od::RX_PDO_ASSIGN, od::RX_PDO_MAPPING) / 8,
                self.mapped_bits(od::TX_PDO_ASSIGN, od::TX_PDO_MAPPING) / 8,
            )
        })
    }

    pub(crate) fn write_rx_pdo(&mut self, data: &[u8]) -> Result<(), BusError> {
        let variant = self
            .rx_variant()
            .ok_or_else(|| BusError::Pdo("no command mapping".to_string()))?;
        let frame = RxFrame::decode(variant, data).map_err(|e| BusError::Pdo(e.to_string()))?;

        self.mode = frame.mode();
        self.take_setpoints(&frame);
        self.in_flight.push_back(frame.controlword());
        while self.in_flight.len() > self.latency {
            if let Some(cw) = self.in_flight.pop_front() {
                self.receive_controlword(cw);
            }
        }
        Ok(())
    }

    pub(crate) fn read_tx_pdo(&self, buf: &mut [u8]) -> Result<(), BusError> {
        let variant = self
            .tx_variant()
            .ok_or_else(|| BusError::Pdo("no telemetry mapping".to_string()))?;
        let statusword = self.statusword().raw();
        let enabled = self.drive_state == DriveState::OperationEnabled;
        let (torque, velocity) = if enabled {
            (self.setpoints.torque, self.setpoints.velocity)
        } else {
            (0, 0)
        };
        let position = self.setpoints.position;

        let frame = match variant {
            TxPdoType::Standard => TxFrame::Standard { statusword },
            TxPdoType::Pvm => TxFrame::Pvm {
                statusword,
                torque_actual: torque,
                velocity_actual: velocity,
                position_actual: position,
                velocity_demand: velocity,
            },
            _ => TxFrame::Cyclic {
                statusword,
                torque_actual: torque,
                velocity_actual: velocity,
                position_actual: position,
            },
        };
        frame
            .encode(buf)
            .map(|_| ())
            .map_err(|e| BusError::Pdo(e.to_string()))
    }

    // ─── Device State Machine ───────────────────────────────────────

    /// Status word of the current drive state.
    pub fn statusword(&self) -> StatusWord {
        let powered = StatusWord::VOLTAGE_ENABLED | StatusWord::REMOTE;
        match self.drive_state {
            DriveState::SwitchOnDisabled => StatusWord::SWITCH_ON_DISABLED | StatusWord::REMOTE,
            DriveState::ReadyToSwitchOn => {
                StatusWord::READY_TO_SWITCH_ON | StatusWord::QUICK_STOP | powered
            }
            DriveState::SwitchedOn => {
                StatusWord::READY_TO_SWITCH_ON
                    | StatusWord::SWITCHED_ON
                    | StatusWord::QUICK_STOP
                    | powered
            }
            DriveState::OperationEnabled => {
                StatusWord::READY_TO_SWITCH_ON
                    | StatusWord::SWITCHED_ON
                    | StatusWord::OPERATION_ENABLED
                    | StatusWord::QUICK_STOP
                    | powered
            }
            DriveState::QuickStopActive => {
                StatusWord::READY_TO_SWITCH_ON
                    | StatusWord::SWITCHED_ON
                    | StatusWord::OPERATION_ENABLED
                    | powered
            }
            DriveState::Fault => StatusWord::FAULT | StatusWord::REMOTE,
        }
    }

    fn receive_controlword(&mut self, cw: ControlWord) {
        let previous = self.last_controlword;
        self.last_controlword = cw;
        if cw != previous {
            self.applied.push(cw);
        }

        let next = next_device_state(self.drive_state, cw, previous);
        if next != self.drive_state {
            trace!(from = %self.drive_state, to = %next, controlword = cw.raw(), "simulated transition");
            if self.drive_state == DriveState::Fault {
                self.store(od::ERROR_CODE, &0u16.to_le_bytes());
            }
            self.drive_state = next;
        }
    }

    fn take_setpoints(&mut self, frame: &RxFrame) {
        match *frame {
            RxFrame::Standard { .. } => {}
            RxFrame::Csp {
                target_position,
                position_offset,
                ..
            } => {
                self.setpoints.position = target_position.wrapping_add(position_offset);
            }
            RxFrame::Cst {
                target_torque,
                torque_offset,
                ..
            } => {
                self.setpoints.torque = target_torque.saturating_add(torque_offset);
            }
            RxFrame::Csv {
                target_velocity,
                velocity_offset,
                ..
            } => {
                self.setpoints.velocity = target_velocity.saturating_add(velocity_offset);
            }
            RxFrame::CstCsp {
                target_position,
                position_offset,
                target_torque,
                torque_offset,
                ..
            } => {
                self.setpoints.position = target_position.wrapping_add(position_offset);
                self.setpoints.torque = target_torque.saturating_add(torque_offset);
            }
            RxFrame::Pvm {
                target_velocity, ..
            } => {
                self.setpoints.velocity = target_velocity;
            }
        }
    }

    // ─── Object Store ───────────────────────────────────────────────

    fn store(&mut self, object: OdAddress, data: &[u8]) {
        self.objects.insert(object, data.to_vec());
    }

    fn u32_at(&self, object: OdAddress) -> u32 {
        self.objects
            .get(&object)
            .map(|bytes| {
                let mut buf = [0u8; 4];
                let n = bytes.len().min(4);
                buf[..n].copy_from_slice(&bytes[..n]);
                u32::from_le_bytes(buf)
            })
            .unwrap_or(0)
    }

    /// Mapping values of `mapping` if it is assigned through `assign`.
    fn mapped_values(&self, assign: u16, mapping: u16) -> Vec<u32> {
        let assigned = self.u32_at(OdAddress::new(assign, 0)) == 1
            && self.u32_at(OdAddress::new(assign, 1)) == mapping as u32;
        if !assigned {
            return Vec::new();
        }
        let count = self.u32_at(OdAddress::new(mapping, 0)) as u8;
        (1..=count)
            .map(|sub| self.u32_at(OdAddress::new(mapping, sub)))
            .collect()
    }

    fn mapped_bits(&self, assign: u16, mapping: u16) -> u16 {
        self.mapped_values(assign, mapping)
            .iter()
            .map(|v| (v & 0xFF) as u16)
            .sum()
    }

    fn rx_variant(&self) -> Option<RxPdoType> {
        let mapped = self.mapped_values(od::RX_PDO_ASSIGN, od::RX_PDO_MAPPING);
        RX_VARIANTS.into_iter().find(|&v| {
            od::rx_mapping(v)
                .iter()
                .map(|e| e.mapping_value())
                .eq(mapped.iter().copied())
        })
    }

    fn tx_variant(&self) -> Option<TxPdoType> {
        let mapped = self.mapped_values(od::TX_PDO_ASSIGN, od::TX_PDO_MAPPING);
        TX_VARIANTS.into_iter().find(|&v| {
            od::tx_mapping(v)
                .iter()
                .map(|e| e.mapping_value())
                .eq(mapped.iter().copied())
        })
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new(1_000)
    }
}

/// Device reaction to `cw` in `state`; `previous` detects the fault reset edge.
fn next_device_state(state: DriveState, cw: ControlWord, previous: ControlWord) -> DriveState {
    use DriveState::*;

    if state == Fault {
        let reset_edge =
            cw.contains(ControlWord::FAULT_RESET) && !previous.contains(ControlWord::FAULT_RESET);
        return if reset_edge { SwitchOnDisabled } else { Fault };
    }

    let voltage = cw.contains(ControlWord::ENABLE_VOLTAGE);
    let quick_stop_released = cw.contains(ControlWord::QUICK_STOP);
    let switch_on = cw.contains(ControlWord::SWITCH_ON);
    let enable = cw.contains(ControlWord::ENABLE_OPERATION);

    if !voltage {
        return SwitchOnDisabled;
    }
    if !quick_stop_released {
        return match state {
            OperationEnabled | QuickStopActive => QuickStopActive,
            _ => SwitchOnDisabled,
        };
    }
    match (state, switch_on, enable) {
        (SwitchOnDisabled | SwitchedOn | OperationEnabled, false, _) => ReadyToSwitchOn,
        (ReadyToSwitchOn, true, _) => SwitchedOn,
        (OperationEnabled, true, false) => SwitchedOn,
        (SwitchedOn, true, true) => OperationEnabled,
        (current, _, _) => current,
    }
}

fn sdo_error(object: OdAddress, reason: &str) -> BusError {
    BusError::Sdo {
        index: object.index,
        sub: object.sub,
        reason: reason.to_string(),
    }
}

fn le_array<const N: usize>(object: OdAddress, data: &[u8]) -> Result<[u8; N], BusError> {
    data.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| sdo_error(object, "data too short"))
}
