//! Object dictionary addresses used by the drive.
//!
//! Only the objects the controller touches are listed. PDO mapping tables are
//! expressed as ordered `PdoEntry` lists whose order matches the frame layouts
//! in [`super::pdo`].

use super::config::{RxPdoType, TxPdoType};

/// Object dictionary address `index:sub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OdAddress {
    pub index: u16,
    pub sub: u8,
}

impl OdAddress {
    pub const fn new(index: u16, sub: u8) -> Self {
        Self { index, sub }
    }
}

// ─── CiA 402 Objects ────────────────────────────────────────────────

pub const CONTROLWORD: OdAddress = OdAddress::new(0x6040, 0);
pub const STATUSWORD: OdAddress = OdAddress::new(0x6041, 0);
pub const ERROR_CODE: OdAddress = OdAddress::new(0x603F, 0);
pub const MODES_OF_OPERATION: OdAddress = OdAddress::new(0x6060, 0);
pub const POSITION_ACTUAL: OdAddress = OdAddress::new(0x6064, 0);
pub const VELOCITY_DEMAND: OdAddress = OdAddress::new(0x606B, 0);
pub const VELOCITY_ACTUAL: OdAddress = OdAddress::new(0x606C, 0);
pub const TARGET_TORQUE: OdAddress = OdAddress::new(0x6071, 0);
pub const TORQUE_ACTUAL: OdAddress = OdAddress::new(0x6077, 0);
pub const TARGET_POSITION: OdAddress = OdAddress::new(0x607A, 0);
pub const PROFILE_ACCELERATION: OdAddress = OdAddress::new(0x6083, 0);
pub const PROFILE_DECELERATION: OdAddress = OdAddress::new(0x6084, 0);
pub const MOTION_PROFILE_TYPE: OdAddress = OdAddress::new(0x6086, 0);
pub const POSITION_OFFSET: OdAddress = OdAddress::new(0x60B0, 0);
pub const VELOCITY_OFFSET: OdAddress = OdAddress::new(0x60B1, 0);
pub const TORQUE_OFFSET: OdAddress = OdAddress::new(0x60B2, 0);
pub const TARGET_VELOCITY: OdAddress = OdAddress::new(0x60FF, 0);

/// Interpolation time period value (sub 1) and index (sub 2, power of ten).
pub const INTERPOLATION_TIME_PERIOD_VALUE: OdAddress = OdAddress::new(0x60C2, 1);
pub const INTERPOLATION_TIME_PERIOD_INDEX: OdAddress = OdAddress::new(0x60C2, 2);

/// Motor nominal current in mA.
pub const MOTOR_NOMINAL_CURRENT: OdAddress = OdAddress::new(0x3001, 2);

// ─── CiA 301 PDO Mapping ────────────────────────────────────────────

pub const RX_PDO_MAPPING: u16 = 0x1600;
pub const TX_PDO_MAPPING: u16 = 0x1A00;
pub const RX_PDO_ASSIGN: u16 = 0x1C12;
pub const TX_PDO_ASSIGN: u16 = 0x1C13;

/// One mapped object inside a PDO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoEntry {
    pub object: OdAddress,
    pub bits: u8,
}

impl PdoEntry {
    const fn new(object: OdAddress, bits: u8) -> Self {
        Self { object, bits }
    }

    /// Mapping object value: `index << 16 | sub << 8 | bit length`.
    #[inline]
    pub const fn mapping_value(self) -> u32 {
        ((self.object.index as u32) << 16) | ((self.object.sub as u32) << 8) | self.bits as u32
    }
}

const CW: PdoEntry = PdoEntry::new(CONTROLWORD, 16);
const MODE: PdoEntry = PdoEntry::new(MODES_OF_OPERATION, 8);
const SW: PdoEntry = PdoEntry::new(STATUSWORD, 16);
const TQ_ACT: PdoEntry = PdoEntry::new(TORQUE_ACTUAL, 16);
const VEL_ACT: PdoEntry = PdoEntry::new(VELOCITY_ACTUAL, 32);
const POS_ACT: PdoEntry = PdoEntry::new(POSITION_ACTUAL, 32);

/// Mapped objects of a write-direction variant, in frame order.
pub const fn rx_mapping(variant: RxPdoType) -> &'static [PdoEntry] {
    const TP: PdoEntry = PdoEntry::new(TARGET_POSITION, 32);
    const PO: PdoEntry = PdoEntry::new(POSITION_OFFSET, 32);
    const TT: PdoEntry = PdoEntry::new(TARGET_TORQUE, 16);
    const TO: PdoEntry = PdoEntry::new(TORQUE_OFFSET, 16);
    const TV: PdoEntry = PdoEntry::new(TARGET_VELOCITY, 32);
    const VO: PdoEntry = PdoEntry::new(VELOCITY_OFFSET, 32);
    const ACC: PdoEntry = PdoEntry::new(PROFILE_ACCELERATION, 32);
    const DEC: PdoEntry = PdoEntry::new(PROFILE_DECELERATION, 32);
    const MPT: PdoEntry = PdoEntry::new(MOTION_PROFILE_TYPE, 16);

    match variant {
        RxPdoType::Na => &[],
        RxPdoType::Standard => &[CW, MODE],
        RxPdoType::Csp => &[TP, PO, TO, CW, MODE],
        RxPdoType::Cst => &[TT, TO, CW, MODE],
        RxPdoType::Csv => &[TV, VO, CW, MODE],
        RxPdoType::CstCsp => &[TP, PO, TT, TO, CW, MODE],
        RxPdoType::Pvm => &[CW, TV, ACC, DEC, MPT, MODE],
    }
}

/// Mapped objects of a read-direction variant, in frame order.
pub const fn tx_mapping(variant: TxPdoType) -> &'static [PdoEntry] {
    const VEL_DEM: PdoEntry = PdoEntry::new(VELOCITY_DEMAND, 32);

    match variant {
        TxPdoType::Na => &[],
        TxPdoType::Standard => &[SW],
        TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv | TxPdoType::CstCsp => {
            &[SW, TQ_ACT, VEL_ACT, POS_ACT]
        }
        TxPdoType::Pvm => &[SW, TQ_ACT, VEL_ACT, POS_ACT, VEL_DEM],
    }
}
