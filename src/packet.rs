// SPDX-License-Identifier: MIT OR Apache-2.0
//! XMODEM data packet framing.

use zerocopy::AsBytes;

use crate::checksum::{self, ChecksumMode};
use crate::config::PacketSize;

/// Fixed packet prefix: start byte, sequence number, sequence complement.
#[repr(C)]
#[derive(AsBytes, Clone, Copy, Debug)]
struct Prefix {
    start: u8,
    number: u8,
    complement: u8,
}

/// A framed data packet ready for the wire.
pub struct Packet(pub Vec<u8>);

impl Packet {
    /// Frames `data` as packet `number`.
    ///
    /// The payload region is right-padded with `padding` to the full
    /// packet size, and the trailing integrity field covers exactly that
    /// padded region. `data` longer than the packet size is a programming
    /// error.
    pub fn new(
        number: u8,
        data: &[u8],
        size: PacketSize,
        padding: u8,
        mode: ChecksumMode,
    ) -> Self {
        assert!(data.len() <= size.len(), "payload exceeds packet size");

        let prefix = Prefix {
            start: size.start_byte(),
            number,
            complement: 255 - number,
        };

        let mut out = Vec::with_capacity(3 + size.len() + mode.width());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(data);
        out.resize(3 + size.len(), padding);

        // Skips the prefix:
        match mode {
            ChecksumMode::Checksum => out.push(checksum::arithmetic(&out[3..])),
            ChecksumMode::Crc => out.extend_from_slice(&checksum::crc16(&out[3..]).to_be_bytes()),
        }

        log::trace!("PACKET #{} ({} bytes)", number, out.len());
        Self(out)
    }
}
