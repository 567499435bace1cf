//! PDO frame codecs.
//!
//! Each configured variant has one fixed little-endian packed layout, listed
//! field by field in declaration order. Encoding and decoding are both
//! provided for both directions: the drive encodes command frames and decodes
//! telemetry, a bus simulator does the reverse.

use heapless::Vec;
use static_assertions::const_assert;
use thiserror::Error;

use super::bus::WireValue;
use super::command::StagedCommand;
use super::config::{RxPdoType, TxPdoType};
use crate::cia402::{ControlWord, ModeOfOperation, StatusWord};
use crate::consts::MAX_PDO_BYTES;

/// Fixed-capacity frame buffer; never allocates.
pub type FrameBuf = Vec<u8, MAX_PDO_BYTES>;

/// Frame codec failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame variant NA has no layout")]
    NoLayout,

    #[error("frame needs {needed} bytes, got {available}")]
    Size { needed: usize, available: usize },
}

// ─── Cursor Helpers ─────────────────────────────────────────────────

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    #[inline]
    fn put<T: WireValue>(&mut self, value: T) -> &mut Self {
        value.write_le(&mut self.buf[self.pos..]);
        self.pos += T::SIZE;
        self
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    #[inline]
    fn get<T: WireValue>(&mut self) -> T {
        let value = T::read_le(&self.buf[self.pos..]);
        self.pos += T::SIZE;
        value
    }
}

fn check_len(needed: usize, available: usize) -> Result<(), FrameError> {
    if needed == 0 {
        return Err(FrameError::NoLayout);
    }
    if available < needed {
        return Err(FrameError::Size { needed, available });
    }
    Ok(())
}

// ─── Write Direction ────────────────────────────────────────────────

/// Command frame sent to the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxFrame {
    Standard {
        controlword: u16,
        mode: i8,
    },
    Csp {
        target_position: i32,
        position_offset: i32,
        torque_offset: i16,
        controlword: u16,
        mode: i8,
    },
    Cst {
        target_torque: i16,
        torque_offset: i16,
        controlword: u16,
        mode: i8,
    },
    Csv {
        target_velocity: i32,
        velocity_offset: i32,
        controlword: u16,
        mode: i8,
    },
    CstCsp {
        target_position: i32,
        position_offset: i32,
        target_torque: i16,
        torque_offset: i16,
        controlword: u16,
        mode: i8,
    },
    Pvm {
        controlword: u16,
        target_velocity: i32,
        profile_acceleration: u32,
        profile_deceleration: u32,
        motion_profile_type: i16,
        mode: i8,
    },
}

impl RxFrame {
    /// Encoded size of `variant` in bytes; 0 for `Na`.
    pub const fn size_of(variant: RxPdoType) -> usize {
        match variant {
            RxPdoType::Na => 0,
            RxPdoType::Standard => 3,
            RxPdoType::Csp => 13,
            RxPdoType::Cst => 7,
            RxPdoType::Csv => 11,
            RxPdoType::CstCsp => 15,
            RxPdoType::Pvm => 17,
        }
    }

    /// Build the frame of `variant` from the staged setpoints.
    ///
    /// Returns `None` for `Na`.
    pub fn from_staged(
        variant: RxPdoType,
        staged: &StagedCommand,
        controlword: ControlWord,
        mode: ModeOfOperation,
    ) -> Option<Self> {
        let controlword = controlword.raw();
        let mode = mode.raw();
        let frame = match variant {
            RxPdoType::Na => return None,
            RxPdoType::Standard => Self::Standard { controlword, mode },
            RxPdoType::Csp => Self::Csp {
                target_position: staged.target_position,
                position_offset: staged.position_offset,
                torque_offset: staged.torque_offset,
                controlword,
                mode,
            },
            RxPdoType::Cst => Self::Cst {
                target_torque: staged.target_torque,
                torque_offset: staged.torque_offset,
                controlword,
                mode,
            },
            RxPdoType::Csv => Self::Csv {
                target_velocity: staged.target_velocity,
                velocity_offset: staged.velocity_offset,
                controlword,
                mode,
            },
            RxPdoType::CstCsp => Self::CstCsp {
                target_position: staged.target_position,
                position_offset: staged.position_offset,
                target_torque: staged.target_torque,
                torque_offset: staged.torque_offset,
                controlword,
                mode,
            },
            RxPdoType::Pvm => Self::Pvm {
                controlword,
                target_velocity: staged.target_velocity,
                profile_acceleration: staged.profile_acceleration,
                profile_deceleration: staged.profile_deceleration,
                motion_profile_type: staged.motion_profile_type,
                mode,
            },
        };
        Some(frame)
    }

    pub const fn variant(&self) -> RxPdoType {
        match self {
            Self::Standard { .. } => RxPdoType::Standard,
            Self::Csp { .. } => RxPdoType::Csp,
            Self::Cst { .. } => RxPdoType::Cst,
            Self::Csv { .. } => RxPdoType::Csv,
            Self::CstCsp { .. } => RxPdoType::CstCsp,
            Self::Pvm { .. } => RxPdoType::Pvm,
        }
    }

    #[inline]
    pub const fn size(&self) -> usize {
        Self::size_of(self.variant())
    }

    pub const fn controlword(&self) -> ControlWord {
        match *self {
            Self::Standard { controlword, .. }
            | Self::Csp { controlword, .. }
            | Self::Cst { controlword, .. }
            | Self::Csv { controlword, .. }
            | Self::CstCsp { controlword, .. }
            | Self::Pvm { controlword, .. } => ControlWord::from_raw(controlword),
        }
    }

    pub const fn mode(&self) -> i8 {
        match *self {
            Self::Standard { mode, .. }
            | Self::Csp { mode, .. }
            | Self::Cst { mode, .. }
            | Self::Csv { mode, .. }
            | Self::CstCsp { mode, .. }
            | Self::Pvm { mode, .. } => mode,
        }
    }

    /// Encode into `buf`. Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let size = self.size();
        check_len(size, buf.len())?;
        let mut w = Writer { buf, pos: 0 };
        match *self {
            Self::Standard { controlword, mode } => {
                w.put(controlword).put(mode);
            }
            Self::Csp {
                target_position,
                position_offset,
                torque_offset,
                controlword,
                mode,
            } => {
                w.put(target_position)
                    .put(position_offset)
                    .put(torque_offset)
                    .put(controlword)
                    .put(mode);
            }
            Self::Cst {
                target_torque,
                torque_offset,
                controlword,
                mode,
            } => {
                w.put(target_torque).put(torque_offset).put(controlword).put(mode);
            }
            Self::Csv {
                target_velocity,
                velocity_offset,
                controlword,
                mode,
            } => {
                w.put(target_velocity)
                    .put(velocity_offset)
                    .put(controlword)
                    .put(mode);
            }
            Self::CstCsp {
                target_position,
                position_offset,
                target_torque,
                torque_offset,
                controlword,
                mode,
            } => {
                w.put(target_position)
                    .put(position_offset)
                    .put(target_torque)
                    .put(torque_offset)
                    .put(controlword)
                    .put(mode);
            }
            Self::Pvm {
                controlword,
                target_velocity,
                profile_acceleration,
                profile_deceleration,
                motion_profile_type,
                mode,
            } => {
                w.put(controlword)
                    .put(target_velocity)
                    .put(profile_acceleration)
                    .put(profile_deceleration)
                    .put(motion_profile_type)
                    .put(mode);
            }
        }
        debug_assert_eq!(w.pos, size);
        Ok(size)
    }

    /// Encode into a fresh fixed-capacity buffer.
    pub fn to_buf(&self) -> Result<FrameBuf, FrameError> {
        let mut buf = FrameBuf::new();
        buf.resize(self.size(), 0).map_err(|_| FrameError::Size {
            needed: self.size(),
            available: MAX_PDO_BYTES,
        })?;
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode a frame of `variant` from `data`.
    pub fn decode(variant: RxPdoType, data: &[u8]) -> Result<Self, FrameError> {
        check_len(Self::size_of(variant), data.len())?;
        let mut r = Reader { buf: data, pos: 0 };
        let frame = match variant {
            RxPdoType::Na => return Err(FrameError::NoLayout),
            RxPdoType::Standard => Self::Standard {
                controlword: r.get(),
                mode: r.get(),
            },
            RxPdoType::Csp => Self::Csp {
                target_position: r.get(),
                position_offset: r.get(),
                torque_offset: r.get(),
                controlword: r.get(),
                mode: r.get(),
            },
            RxPdoType::Cst => Self::Cst {
                target_torque: r.get(),
                torque_offset: r.get(),
                controlword: r.get(),
                mode: r.get(),
            },
            RxPdoType::Csv => Self::Csv {
                target_velocity: r.get(),
                velocity_offset: r.get(),
                controlword: r.get(),
                mode: r.get(),
            },
            RxPdoType::CstCsp => Self::CstCsp {
                target_position: r.get(),
                position_offset: r.get(),
                target_torque: r.get(),
                torque_offset: r.get(),
                controlword: r.get(),
                mode: r.get(),
            },
            RxPdoType::Pvm => Self::Pvm {
                controlword: r.get(),
                target_velocity: r.get(),
                profile_acceleration: r.get(),
                profile_deceleration: r.get(),
                motion_profile_type: r.get(),
                mode: r.get(),
            },
        };
        Ok(frame)
    }
}

// ─── Read Direction ─────────────────────────────────────────────────

/// Telemetry frame received from the drive.
///
/// The four cyclic synchronous variants share one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFrame {
    Standard {
        statusword: u16,
    },
    Cyclic {
        statusword: u16,
        torque_actual: i16,
        velocity_actual: i32,
        position_actual: i32,
    },
    Pvm {
        statusword: u16,
        torque_actual: i16,
        velocity_actual: i32,
        position_actual: i32,
        velocity_demand: i32,
    },
}

impl TxFrame {
    /// Encoded size of `variant` in bytes; 0 for `Na`.
    pub const fn size_of(variant: TxPdoType) -> usize {
        match variant {
            TxPdoType::Na => 0,
            TxPdoType::Standard => 2,
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv | TxPdoType::CstCsp => 12,
            TxPdoType::Pvm => 16,
        }
    }

    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::Standard { .. } => Self::size_of(TxPdoType::Standard),
            Self::Cyclic { .. } => Self::size_of(TxPdoType::Csp),
            Self::Pvm { .. } => Self::size_of(TxPdoType::Pvm),
        }
    }

    pub const fn statusword(&self) -> StatusWord {
        match *self {
            Self::Standard { statusword }
            | Self::Cyclic { statusword, .. }
            | Self::Pvm { statusword, .. } => StatusWord::from_raw(statusword),
        }
    }

    /// Encode into `buf`. Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let size = self.size();
        check_len(size, buf.len())?;
        let mut w = Writer { buf, pos: 0 };
        match *self {
            Self::Standard { statusword } => {
                w.put(statusword);
            }
            Self::Cyclic {
                statusword,
                torque_actual,
                velocity_actual,
                position_actual,
            } => {
                w.put(statusword)
                    .put(torque_actual)
                    .put(velocity_actual)
                    .put(position_actual);
            }
            Self::Pvm {
                statusword,
                torque_actual,
                velocity_actual,
                position_actual,
                velocity_demand,
            } => {
                w.put(statusword)
                    .put(torque_actual)
                    .put(velocity_actual)
                    .put(position_actual)
                    .put(velocity_demand);
            }
        }
        debug_assert_eq!(w.pos, size);
        Ok(size)
    }

    /// Decode a frame of `variant` from `data`.
    pub fn decode(variant: TxPdoType, data: &[u8]) -> Result<Self, FrameError> {
        check_len(Self::size_of(variant), data.len())?;
        let mut r = Reader { buf: data, pos: 0 };
        let frame = match variant {
            TxPdoType::Na => return Err(FrameError::NoLayout),
            TxPdoType::Standard => Self::Standard { statusword: r.get() },
            TxPdoType::Csp | TxPdoType::Cst | TxPdoType::Csv | TxPdoType::CstCsp => Self::Cyclic {
                statusword: r.get(),
                torque_actual: r.get(),
                velocity_actual: r.get(),
                position_actual: r.get(),
            },
            TxPdoType::Pvm => Self::Pvm {
                statusword: r.get(),
                torque_actual: r.get(),
                velocity_actual: r.get(),
                position_actual: r.get(),
                velocity_demand: r.get(),
            },
        };
        Ok(frame)
    }
}

const_assert!(RxFrame::size_of(RxPdoType::Pvm) <= MAX_PDO_BYTES);
const_assert!(RxFrame::size_of(RxPdoType::CstCsp) <= MAX_PDO_BYTES);
const_assert!(TxFrame::size_of(TxPdoType::Pvm) <= MAX_PDO_BYTES);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let frame = RxFrame::Standard {
            controlword: 0x000F,
            mode: 8,
        };
        let buf = frame.to_buf().unwrap();
        assert_eq!(buf.as_slice(), &[0x0F, 0x00, 0x08]);
    }

    #[test]
    fn test_csp_layout_is_packed_in_order() {
        let frame = RxFrame::Csp {
            target_position: 0x0102_0304,
            position_offset: -1,
            torque_offset: 0x0506,
            controlword: 0x0007,
            mode: 8,
        };
        let mut buf = [0u8; 16];
        assert_eq!(frame.encode(&mut buf), Ok(13));
        assert_eq!(
            &buf[..13],
            &[0x04, 0x03, 0x02, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x06, 0x05, 0x07, 0x00, 0x08]
        );
    }

    #[test]
    fn test_pvm_control_word_leads() {
        let staged = StagedCommand {
            target_velocity: 1200,
            profile_acceleration: 300,
            profile_deceleration: 400,
            motion_profile_type: 1,
            ..StagedCommand::default()
        };
        let frame = RxFrame::from_staged(
            RxPdoType::Pvm,
            &staged,
            ControlWord::ENABLE_OPERATION_CMD,
            ModeOfOperation::ProfileVelocity,
        )
        .unwrap();
        let buf = frame.to_buf().unwrap();
        assert_eq!(buf.len(), 17);
        assert_eq!(&buf[..2], &[0x0F, 0x00]);
        assert_eq!(buf[16], 3);
        assert_eq!(RxFrame::decode(RxPdoType::Pvm, &buf), Ok(frame));
    }

    #[test]
    fn test_cst_csp_carries_both_setpoints() {
        let staged = StagedCommand {
            target_position: 10,
            target_torque: -20,
            ..StagedCommand::default()
        };
        let frame = RxFrame::from_staged(
            RxPdoType::CstCsp,
            &staged,
            ControlWord::SHUTDOWN,
            ModeOfOperation::CyclicSyncTorque,
        )
        .unwrap();
        match frame {
            RxFrame::CstCsp {
                target_position,
                target_torque,
                mode,
                ..
            } => {
                assert_eq!(target_position, 10);
                assert_eq!(target_torque, -20);
                assert_eq!(mode, 10);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_na_has_no_frame() {
        assert_eq!(
            RxFrame::from_staged(
                RxPdoType::Na,
                &StagedCommand::default(),
                ControlWord::SHUTDOWN,
                ModeOfOperation::Na
            ),
            None
        );
        assert_eq!(TxFrame::decode(TxPdoType::Na, &[0; 8]), Err(FrameError::NoLayout));
    }

    #[test]
    fn test_short_buffers_rejected() {
        assert_eq!(
            TxFrame::decode(TxPdoType::Csv, &[0; 11]),
            Err(FrameError::Size {
                needed: 12,
                available: 11
            })
        );
        let frame = RxFrame::Standard {
            controlword: 0,
            mode: 0,
        };
        assert!(frame.encode(&mut [0u8; 2]).is_err());
    }

    #[test]
    fn test_tx_decode_cyclic_variants_share_layout() {
        let frame = TxFrame::Cyclic {
            statusword: 0x0237,
            torque_actual: -150,
            velocity_actual: 3000,
            position_actual: -123_456,
        };
        let mut buf = [0u8; 12];
        frame.encode(&mut buf).unwrap();
        for variant in [TxPdoType::Csp, TxPdoType::Cst, TxPdoType::Csv, TxPdoType::CstCsp] {
            assert_eq!(TxFrame::decode(variant, &buf), Ok(frame));
        }
        assert_eq!(frame.statusword().raw(), 0x0237);
    }

    #[test]
    fn test_sizes_fit_buffer() {
        assert!(TxFrame::size_of(TxPdoType::Pvm) <= MAX_PDO_BYTES);
        assert_eq!(RxFrame::size_of(RxPdoType::Na), 0);
    }
}
