// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event-driven sender state machine.
//!
//! [`Sender`] performs no I/O: the caller delivers bytes read from the
//! receiver and transmits whatever [`Outcome::Send`] hands back. One input
//! produces one outcome, in order.

use crate::checksum::ChecksumMode;
use crate::config::Config;
use crate::packet::Packet;
use crate::timer::{Clock, StdClock};
use crate::{ACK, CAN, CRC_SELECT, EOT, ETB, NAK};

/// Sender lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// No packet sent yet; awaiting the receiver's mode-selection byte.
    Init,
    /// A data packet is outstanding; awaiting ACK or NAK.
    Sending,
    /// All data acknowledged; EOT sent, awaiting ACK.
    SentEot,
    /// EOT acknowledged; ETB sent, awaiting the final ACK.
    SentEtb,
    /// Terminal.
    Terminated,
}

/// What the caller should do with the wire after feeding the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Transmit these bytes to the receiver.
    Send(Vec<u8>),
    /// Nothing to transmit.
    Ignore,
    /// Transfer finished; the engine is terminated.
    Done,
}

/// Transfer errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Two consecutive CAN bytes arrived from the receiver. Terminal.
    #[error("transfer canceled by receiver")]
    CanceledByReceiver,
    /// A NAK arrived with the retry budget already spent. Terminal.
    #[error("retry limit exceeded")]
    MaxRetriesExceeded,
    /// A byte with no meaning in the current state; the engine is
    /// unchanged.
    #[error("unexpected data from receiver")]
    UnexpectedData,
    /// The engine is already terminated.
    #[error("no transfer in progress")]
    NoProcess,
    /// No input arrived within the receive timeout. Terminal.
    #[error("receive timeout expired")]
    Timeout,
    /// Transfers of zero-length payloads are not started.
    #[error("payload is empty")]
    EmptyPayload,
}

/// XMODEM sender engine.
pub struct Sender<C: Clock = StdClock> {
    payload: Vec<u8>,
    cfg: Config,
    clock: C,
    state: State,
    position: usize,
    packet_number: u8,
    sent_packets: usize,
    total_packets: usize,
    retries: u32,
    cancels: u32,
    mode: Option<ChecksumMode>,
    deadline: Option<C::Instant>,
}

impl Sender<StdClock> {
    /// Starts a transfer of `payload` under `cfg`.
    pub fn new(payload: Vec<u8>, cfg: Config) -> Result<Self, Error> {
        Sender::with_clock(payload, cfg, StdClock)
    }
}

impl<C: Clock> Sender<C> {
    /// Starts a transfer using the provided clock.
    pub fn with_clock(payload: Vec<u8>, cfg: Config, clock: C) -> Result<Self, Error> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let size = cfg.packet_size.len();
        let total_packets = (payload.len() + size - 1) / size;

        Ok(Self {
            payload,
            cfg,
            clock,
            state: State::Init,
            position: 0,
            packet_number: 1,
            sent_packets: 0,
            total_packets,
            retries: 0,
            cancels: 0,
            mode: None,
            deadline: None,
        })
    }

    /// Delivers bytes read from the receiver.
    ///
    /// The first byte of `chunk` selects the transition and trailing bytes
    /// are discarded, except that a leading run of CAN bytes is counted in
    /// full, so a cancel pair arriving in one chunk still cancels.
    pub fn receive(&mut self, chunk: &[u8]) -> Result<Outcome, Error> {
        if self.state == State::Terminated {
            return Err(Error::NoProcess);
        }

        if self.state == State::Sending {
            if let Some(deadline) = self.deadline {
                if self.clock.now() >= deadline {
                    log::debug!("receive timeout expired on packet #{}", self.packet_number);
                    self.state = State::Terminated;
                    return Err(Error::Timeout);
                }
            }
        }

        let first = match chunk.first() {
            Some(&b) => b,
            None => return Err(Error::UnexpectedData),
        };

        if first == CAN {
            self.cancels += chunk.iter().take_while(|&&b| b == CAN).count() as u32;
            if self.cancels >= 2 {
                log::debug!("canceled by receiver");
                self.state = State::Terminated;
                return Err(Error::CanceledByReceiver);
            }
            return Ok(Outcome::Ignore);
        }
        self.cancels = 0;

        match (self.state, self.mode, first) {
            (State::Init, None, NAK) => Ok(self.start(ChecksumMode::Checksum)),
            (State::Init, None, CRC_SELECT) => Ok(self.start(ChecksumMode::Crc)),
            // Receivers keep polling with 'C' until the first packet lands:
            (_, _, CRC_SELECT) => Ok(Outcome::Ignore),
            (State::Sending, Some(mode), ACK) => Ok(self.advance(mode)),
            (State::Sending, Some(mode), NAK) => self.retry(mode),
            (State::SentEot, _, ACK) => {
                log::debug!("EOT acknowledged");
                self.state = State::SentEtb;
                Ok(Outcome::Send(vec![ETB]))
            }
            (State::SentEtb, _, ACK) => {
                log::debug!("transfer complete");
                self.state = State::Terminated;
                Ok(Outcome::Done)
            }
            _ => Err(Error::UnexpectedData),
        }
    }

    /// Distinct packets emitted so far and the transfer total.
    pub fn progress(&self) -> Result<(usize, usize), Error> {
        if self.state == State::Terminated {
            return Err(Error::NoProcess);
        }
        Ok((self.sent_packets, self.total_packets))
    }

    /// Cancels the transfer, yielding the CAN pair to put on the wire.
    ///
    /// Idempotent: a terminated engine yields no bytes.
    pub fn cancel(&mut self) -> Outcome {
        if self.state == State::Terminated {
            return Outcome::Ignore;
        }
        log::debug!("canceling transfer");
        self.state = State::Terminated;
        Outcome::Send(vec![CAN, CAN])
    }

    /// Cooperative shutdown; emits nothing. Idempotent.
    pub fn stop(&mut self) {
        self.state = State::Terminated;
    }

    /// Receive deadline, armed while a packet awaits acknowledgement.
    pub fn deadline(&self) -> Option<C::Instant> {
        if self.state == State::Sending {
            self.deadline
        } else {
            None
        }
    }

    fn start(&mut self, mode: ChecksumMode) -> Outcome {
        log::debug!("mode selected: {:?}", mode);
        self.mode = Some(mode);
        self.sent_packets = 1;
        self.enter_sending();
        Outcome::Send(self.current_packet(mode))
    }

    fn advance(&mut self, mode: ChecksumMode) -> Outcome {
        if self.position + self.cfg.packet_size.len() >= self.payload.len() {
            log::debug!("all data acknowledged, sending EOT");
            self.retries = 0;
            self.state = State::SentEot;
            return Outcome::Send(vec![EOT]);
        }

        self.position += self.cfg.packet_size.len();
        self.packet_number = self.packet_number.wrapping_add(1);
        self.sent_packets += 1;
        self.enter_sending();
        Outcome::Send(self.current_packet(mode))
    }

    fn retry(&mut self, mode: ChecksumMode) -> Result<Outcome, Error> {
        if self.retries >= self.cfg.max_retries {
            log::debug!("retry limit reached on packet #{}", self.packet_number);
            self.state = State::Terminated;
            return Err(Error::MaxRetriesExceeded);
        }

        // A retry repeats the outstanding packet and keeps the armed
        // deadline; only (re-)entry to Sending rearms it.
        self.retries += 1;
        log::debug!("NAK, retry {}/{}", self.retries, self.cfg.max_retries);
        Ok(Outcome::Send(self.current_packet(mode)))
    }

    /// Single entry point for the Sending state: counters cleared, receive
    /// deadline rearmed.
    fn enter_sending(&mut self) {
        self.state = State::Sending;
        self.retries = 0;
        self.cancels = 0;
        self.deadline = self
            .cfg
            .recv_timeout
            .map(|t| self.clock.add(self.clock.now(), t));
    }

    fn current_packet(&self, mode: ChecksumMode) -> Vec<u8> {
        let end = (self.position + self.cfg.packet_size.len()).min(self.payload.len());
        Packet::new(
            self.packet_number,
            &self.payload[self.position..end],
            self.cfg.packet_size,
            self.cfg.padding,
            mode,
        )
        .0
    }
}
