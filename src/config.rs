// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-transfer settings.

use core::convert::TryFrom;
use core::time::Duration;

use crate::{SOH, STX, SUB};

/// Payload length of a data packet.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketSize {
    /// Classic 128-byte packets, framed with SOH.
    Standard = 128,
    /// XMODEM-1K 1024-byte packets, framed with STX.
    OneK = 1024,
}

const SIZES: &[PacketSize] = &[PacketSize::Standard, PacketSize::OneK];

#[derive(Clone, Copy, Debug)]
pub struct InvalidSize;

impl TryFrom<usize> for PacketSize {
    type Error = InvalidSize;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        SIZES
            .iter()
            .find(|s| value == **s as usize)
            .map_or(Err(InvalidSize), |s| Ok(*s))
    }
}

impl PacketSize {
    /// Payload length in bytes.
    pub const fn len(self) -> usize {
        self as usize
    }

    /// Start byte framing packets of this size.
    pub const fn start_byte(self) -> u8 {
        match self {
            PacketSize::Standard => SOH,
            PacketSize::OneK => STX,
        }
    }
}

/// Immutable transfer configuration.
///
/// `packet_size` and `padding` are closed types, so every representable
/// configuration is valid on the wire.
#[derive(Clone, Debug)]
pub struct Config {
    /// Data packet payload length.
    pub packet_size: PacketSize,
    /// Fill byte for the final short packet.
    pub padding: u8,
    /// Consecutive NAKs tolerated on one packet before aborting.
    pub max_retries: u32,
    /// Inactivity limit while a packet awaits acknowledgement (`None`
    /// disables the timeout).
    pub recv_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packet_size: PacketSize::Standard,
            padding: SUB,
            max_retries: 2,
            recv_timeout: Some(Duration::from_millis(5000)),
        }
    }
}
