// SPDX-License-Identifier: MIT OR Apache-2.0
//! Supervised owner for a [`Sender`].
//!
//! The engine never waits on its own; this module runs it on a dedicated
//! thread that serializes receiver bytes, control calls and the receive
//! timeout in arrival order. When the timeout fires the thread records
//! the fault and exits, and every later call on the handle observes it.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crate::config::Config;
use crate::send::{Error, Outcome, Sender};

enum Request {
    Receive(Vec<u8>, mpsc::Sender<Result<Outcome, Error>>),
    Cancel(mpsc::Sender<Outcome>),
    Progress(mpsc::Sender<Result<(usize, usize), Error>>),
    Stop,
}

/// Handle to a transfer running on its own thread.
pub struct Handle {
    requests: mpsc::Sender<Request>,
    fault: Arc<Mutex<Option<Error>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Handle {
    /// Spawns the owning thread for a new transfer.
    pub fn start(payload: Vec<u8>, cfg: Config) -> Result<Handle, Error> {
        let sender = Sender::new(payload, cfg)?;
        let (requests, inbox) = mpsc::channel();
        let fault = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&fault);
        let thread = thread::spawn(move || run(sender, inbox, slot));

        Ok(Handle {
            requests,
            fault,
            thread: Some(thread),
        })
    }

    /// Delivers bytes from the receiver.
    pub fn receive_bytes(&self, bytes: &[u8]) -> Result<Outcome, Error> {
        let (reply, result) = mpsc::channel();
        if self
            .requests
            .send(Request::Receive(bytes.to_vec(), reply))
            .is_err()
        {
            return Err(self.fault());
        }
        match result.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(self.fault()),
        }
    }

    /// Cancels the transfer; yields the CAN pair to transmit while live.
    pub fn cancel(&self) -> Outcome {
        let (reply, result) = mpsc::channel();
        if self.requests.send(Request::Cancel(reply)).is_err() {
            return Outcome::Ignore;
        }
        result.recv().unwrap_or(Outcome::Ignore)
    }

    /// Packets emitted so far and the transfer total.
    pub fn progress(&self) -> Result<(usize, usize), Error> {
        let (reply, result) = mpsc::channel();
        if self.requests.send(Request::Progress(reply)).is_err() {
            return Err(self.fault());
        }
        match result.recv() {
            Ok(progress) => progress,
            Err(_) => Err(self.fault()),
        }
    }

    /// Asks the owning thread to shut down. Idempotent.
    pub fn stop(&self) {
        let _ = self.requests.send(Request::Stop);
    }

    /// Terminal fault recorded by the owning thread, if any.
    fn fault(&self) -> Error {
        self.fault
            .lock()
            .ok()
            .and_then(|slot| *slot)
            .unwrap_or(Error::NoProcess)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(mut sender: Sender, inbox: mpsc::Receiver<Request>, fault: Arc<Mutex<Option<Error>>>) {
    loop {
        let request = match sender.deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match inbox.recv_timeout(wait) {
                    Ok(request) => request,
                    Err(RecvTimeoutError::Timeout) => {
                        log::debug!("transfer timed out waiting for the receiver");
                        sender.stop();
                        record(&fault, Error::Timeout);
                        return;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match inbox.recv() {
                Ok(request) => request,
                Err(_) => return,
            },
        };

        match request {
            Request::Receive(bytes, reply) => {
                let result = sender.receive(&bytes);
                if result == Err(Error::Timeout) {
                    record(&fault, Error::Timeout);
                }
                let _ = reply.send(result);
            }
            Request::Cancel(reply) => {
                let _ = reply.send(sender.cancel());
            }
            Request::Progress(reply) => {
                let _ = reply.send(sender.progress());
            }
            Request::Stop => return,
        }
    }
}

fn record(fault: &Arc<Mutex<Option<Error>>>, error: Error) {
    if let Ok(mut slot) = fault.lock() {
        *slot = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ACK, CAN, CRC_SELECT, EOT, ETB};
    use core::time::Duration;
    use std::thread::sleep;

    fn config(recv_timeout: Option<Duration>) -> Config {
        Config {
            recv_timeout,
            ..Config::default()
        }
    }

    #[test]
    fn test_handle_happy_path() {
        let handle = Handle::start(b"hello".to_vec(), config(None)).unwrap();

        match handle.receive_bytes(&[CRC_SELECT]).unwrap() {
            Outcome::Send(packet) => assert_eq!(packet.len(), 133),
            other => panic!("expected a packet, got {:?}", other),
        }
        assert_eq!(handle.progress().unwrap(), (1, 1));
        assert_eq!(
            handle.receive_bytes(&[ACK]).unwrap(),
            Outcome::Send(vec![EOT])
        );
        assert_eq!(
            handle.receive_bytes(&[ACK]).unwrap(),
            Outcome::Send(vec![ETB])
        );
        assert_eq!(handle.receive_bytes(&[ACK]).unwrap(), Outcome::Done);
        assert_eq!(handle.receive_bytes(&[ACK]), Err(Error::NoProcess));
    }

    #[test]
    fn test_handle_cancel() {
        let handle = Handle::start(b"hello".to_vec(), config(None)).unwrap();

        let _ = handle.receive_bytes(&[CRC_SELECT]).unwrap();
        assert_eq!(handle.cancel(), Outcome::Send(vec![CAN, CAN]));
        assert_eq!(handle.receive_bytes(&[ACK]), Err(Error::NoProcess));
        assert_eq!(handle.cancel(), Outcome::Ignore);
    }

    #[test]
    fn test_handle_timeout() {
        let timeout = Some(Duration::from_millis(30));
        let handle = Handle::start(b"hello".to_vec(), config(timeout)).unwrap();

        let _ = handle.receive_bytes(&[CRC_SELECT]).unwrap();
        sleep(Duration::from_millis(150));
        assert_eq!(handle.receive_bytes(&[ACK]), Err(Error::Timeout));
        assert_eq!(handle.progress(), Err(Error::Timeout));
    }

    #[test]
    fn test_no_timeout_before_mode_selection() {
        let timeout = Some(Duration::from_millis(30));
        let handle = Handle::start(b"hello".to_vec(), config(timeout)).unwrap();

        sleep(Duration::from_millis(150));
        assert!(handle.receive_bytes(&[CRC_SELECT]).is_ok());
    }

    #[test]
    fn test_stop_shuts_the_thread_down() {
        let handle = Handle::start(b"hello".to_vec(), config(None)).unwrap();
        handle.stop();
        // Depending on timing the thread may still answer one request; it
        // must not wedge either way.
        let _ = handle.receive_bytes(&[CRC_SELECT]);
    }
}
