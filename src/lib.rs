// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sender-side engine for the XMODEM file transfer protocol, covering the
//! classic checksum variant, XMODEM-CRC and XMODEM-1K.
//!
//! The crate is transport-agnostic. [`Sender`] consumes bytes read from
//! the receiver and returns the bytes to put on the wire; it never touches
//! a device itself. [`task::Handle`] wraps a `Sender` in a dedicated
//! thread when a supervised, timeout-aware owner is wanted.

use crc::{Crc, CRC_16_XMODEM};

pub mod checksum;
pub mod config;
pub mod packet;
pub mod send;
pub mod task;
pub mod timer;

pub use checksum::ChecksumMode;
pub use config::{Config, PacketSize};
pub use send::{Error, Outcome, Sender};
pub use task::Handle;

pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Start of a 128-byte data packet.
pub const SOH: u8 = 0x01;
/// Start of a 1024-byte data packet.
pub const STX: u8 = 0x02;
/// End of transmission.
pub const EOT: u8 = 0x04;
/// Positive acknowledgement.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement; selects checksum mode when it opens a
/// transfer.
pub const NAK: u8 = 0x15;
/// End of transmission block.
pub const ETB: u8 = 0x17;
/// Cancel; two in a row abort the transfer.
pub const CAN: u8 = 0x18;
/// Selects CRC mode when it opens a transfer.
pub const CRC_SELECT: u8 = b'C';
/// Default fill byte for the final short packet (SUB, Ctrl-Z).
pub const SUB: u8 = 0x1A;
