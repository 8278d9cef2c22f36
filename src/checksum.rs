// SPDX-License-Identifier: MIT OR Apache-2.0
//! Packet integrity fields: arithmetic checksum and CRC-16/XMODEM.

use crate::CRC16;

/// Integrity mode, selected by the receiver's opening byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Single-byte modulo-256 sum (opening NAK).
    Checksum,
    /// CRC-16/XMODEM, transmitted big-endian (opening 'C').
    Crc,
}

impl ChecksumMode {
    /// Width of the trailing integrity field in bytes.
    pub const fn width(self) -> usize {
        match self {
            ChecksumMode::Checksum => 1,
            ChecksumMode::Crc => 2,
        }
    }
}

/// Modulo-256 sum of `data`.
pub fn arithmetic(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &b| acc.wrapping_add(b))
}

/// CRC-16/XMODEM: polynomial 0x1021, zero initial value, no reflection,
/// no final xor.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
