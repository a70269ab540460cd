//! Background pump: owns the socket for the lifetime of one session.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{SessionState, SharedState};
use crate::protocol::{FrameDecoder, Packet, encode_command};
use crate::{Result, TelemetryError};

/// Why the pump stopped without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Cancelled,
    PeerClosed,
    ForegroundGone,
}

pub(super) struct Pump {
    pub(super) stream: TcpStream,
    pub(super) peer: SocketAddr,
    pub(super) decoder: FrameDecoder,
    /// Decoded packets waiting for the inbound mailbox to empty
    pub(super) buffered: Vec<Packet>,
    pub(super) inbound: mpsc::Sender<Vec<Packet>>,
    pub(super) outbound: mpsc::Receiver<String>,
    pub(super) cancel: CancellationToken,
    pub(super) state: Arc<SharedState>,
    pub(super) interval: Duration,
    pub(super) recv_buf: Vec<u8>,
}

impl Pump {
    pub(super) fn run(mut self) {
        debug!(peer = %self.peer, "Session pump started");

        match self.pump() {
            Ok(Exit::Cancelled) => debug!(peer = %self.peer, "Session pump cancelled"),
            Ok(Exit::PeerClosed) => info!(peer = %self.peer, "Emitter closed the session"),
            Ok(Exit::ForegroundGone) => debug!(peer = %self.peer, "Session owner dropped"),
            Err(e) => warn!(peer = %self.peer, error = %e, "Session failed"),
        }

        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            trace!(error = %e, "Socket shutdown after close");
        }
        self.hand_off_remaining();
        self.state.store(SessionState::Disconnected);
    }

    /// Deliver packets decoded before the exit. The session stays Connected
    /// until the foreground has taken the previous batch, so the last batch is
    /// in the mailbox by the time Disconnected is observed. Cancellation or a
    /// dropped receiver gives up.
    fn hand_off_remaining(&mut self) {
        while !self.buffered.is_empty() {
            match self.inbound.try_send(std::mem::take(&mut self.buffered)) {
                Ok(()) => trace!("Final inbound batch handed off"),
                Err(TrySendError::Full(batch)) => {
                    self.buffered = batch;
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    std::thread::sleep(self.interval);
                }
                Err(TrySendError::Closed(batch)) => {
                    self.buffered = batch;
                    break;
                }
            }
        }

        if !self.buffered.is_empty() {
            debug!(dropped = self.buffered.len(), "Discarding undelivered packets");
        }
    }

    fn pump(&mut self) -> Result<Exit> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Exit::Cancelled);
            }

            std::thread::sleep(self.interval);

            if let Some(exit) = self.service_mailboxes()? {
                return Ok(exit);
            }

            if let Some(exit) = self.receive()? {
                return Ok(exit);
            }
        }
    }

    /// Move buffered packets into the inbound slot if it is free, then send
    /// any pending command.
    fn service_mailboxes(&mut self) -> Result<Option<Exit>> {
        if !self.buffered.is_empty() {
            match self.inbound.try_send(std::mem::take(&mut self.buffered)) {
                Ok(()) => trace!("Inbound batch handed off"),
                Err(TrySendError::Full(batch)) => self.buffered = batch,
                Err(TrySendError::Closed(_)) => return Ok(Some(Exit::ForegroundGone)),
            }
        }

        match self.outbound.try_recv() {
            Ok(command) => {
                self.send_all(&encode_command(&command))?;
                debug!(%command, "Console command sent");
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return Ok(Some(Exit::ForegroundGone)),
        }

        Ok(None)
    }

    /// One non-blocking receive, decoded into the local buffer.
    fn receive(&mut self) -> Result<Option<Exit>> {
        match self.stream.read(&mut self.recv_buf) {
            Ok(0) => Ok(Some(Exit::PeerClosed)),
            Ok(n) => {
                let packets = self.decoder.push(&self.recv_buf[..n])?;
                trace!(
                    bytes = n,
                    packets = packets.len(),
                    partial = self.decoder.pending_len(),
                    "Received"
                );
                self.buffered.extend(packets);
                Ok(None)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(None)
            }
            Err(e) => Err(TelemetryError::io_error("receiving from emitter", e)),
        }
    }

    /// Write every byte, waiting out would-block on the non-blocking socket.
    fn send_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.stream.write(bytes) {
                Ok(0) => {
                    return Err(TelemetryError::io_error(
                        "sending console command",
                        ErrorKind::WriteZero.into(),
                    ));
                }
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if self.cancel.is_cancelled() {
                        return Ok(());
                    }
                    std::thread::sleep(self.interval);
                }
                Err(e) => return Err(TelemetryError::io_error("sending console command", e)),
            }
        }
        Ok(())
    }
}
