//! Session transport: one TCP connection to an emitter at a time.
//!
//! The socket is owned by a background pump thread. The foreground talks to
//! it through two capacity-one mailboxes:
//!
//! - inbound carries a batch of decoded packets; the pump holds newer packets
//!   locally until the foreground has taken the previous batch
//! - outbound carries one console command; [`Session::try_send_command`]
//!   refuses to overwrite a command the pump hasn't sent yet
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//! use rearview::{ClientConfig, Session};
//!
//! # fn main() -> rearview::Result<()> {
//! let mut session = Session::new(&ClientConfig::default());
//! session.connect(Ipv4Addr::LOCALHOST, 0)?;
//!
//! for packet in session.take_inbound() {
//!     println!("{packet:?}");
//! }
//! session.disconnect();
//! # Ok(())
//! # }
//! ```

mod pump;


use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::protocol::{FrameDecoder, Packet};
use crate::{Result, TelemetryError};

use pump::Pump;

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Connected => 2,
        }
    }
}

/// Session state shared with the pump thread.
#[derive(Debug, Default)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: SessionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Client side of the emitter connection.
#[derive(Debug)]
pub struct Session {
    state: Arc<SharedState>,
    worker: Option<SessionWorker>,
    default_port: u16,
    connect_timeout: Duration,
    pump_interval: Duration,
    recv_buffer_size: usize,
    max_frame_len: u32,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: Arc::new(SharedState::default()),
            worker: None,
            default_port: config.default_session_port,
            connect_timeout: config.connect_timeout,
            pump_interval: config.pump_interval,
            recv_buffer_size: config.recv_buffer_size,
            max_frame_len: config.max_frame_len,
        }
    }

    /// Connect to an emitter and start the pump thread.
    ///
    /// Any previous worker is stopped and joined first, so at most one pump
    /// runs per session. Port 0 selects the configured default port. Blocks
    /// for at most the configured connect timeout.
    pub fn connect(&mut self, address: Ipv4Addr, port: u16) -> Result<()> {
        if let Some(stale) = self.worker.take() {
            debug!(peer = %stale.peer, "Reaping previous session worker");
            drop(stale);
        }

        let port = if port == 0 { self.default_port } else { port };
        let peer = SocketAddr::V4(SocketAddrV4::new(address, port));

        self.state.store(SessionState::Connecting);
        match self.open(peer) {
            Ok(worker) => {
                info!(%peer, "Session connected");
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.state.store(SessionState::Disconnected);
                warn!(%peer, error = %e, "Session connect failed");
                Err(e)
            }
        }
    }

    fn open(&self, peer: SocketAddr) -> Result<SessionWorker> {
        let stream =
            TcpStream::connect_timeout(&peer, self.connect_timeout).map_err(|e| match e.kind() {
                ErrorKind::TimedOut => TelemetryError::Timeout { duration: self.connect_timeout },
                _ => TelemetryError::connection_failed_with_source(
                    format!("connect to {peer}"),
                    e.into(),
                ),
            })?;
        stream
            .set_nonblocking(true)
            .map_err(|e| TelemetryError::io_error("setting session socket non-blocking", e))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle on session socket");
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        // Connected before the pump starts, so a pump that exits at once
        // leaves the state Disconnected.
        self.state.store(SessionState::Connected);

        let pump = Pump {
            stream,
            peer,
            decoder: FrameDecoder::new(self.max_frame_len),
            buffered: Vec::new(),
            inbound: inbound_tx,
            outbound: outbound_rx,
            cancel: cancel.clone(),
            state: Arc::clone(&self.state),
            interval: self.pump_interval,
            recv_buf: vec![0; self.recv_buffer_size],
        };

        let thread = std::thread::Builder::new()
            .name("rearview-session".into())
            .spawn(move || pump.run())
            .map_err(|e| TelemetryError::io_error("spawning session thread", e))?;

        Ok(SessionWorker {
            thread: Some(thread),
            cancel,
            inbound: inbound_rx,
            outbound: outbound_tx,
            peer,
        })
    }

    /// Ask the pump to close the socket. Returns without waiting; the next
    /// [`connect`](Self::connect) or [`shutdown`](Self::shutdown) reaps the
    /// thread.
    pub fn disconnect(&mut self) {
        if let Some(worker) = &self.worker {
            debug!(peer = %worker.peer, "Session disconnect requested");
            worker.cancel.cancel();
        }
        self.state.store(SessionState::Disconnected);
    }

    pub fn is_connected(&self) -> bool {
        self.state.load() == SessionState::Connected
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Address of the current or most recent emitter.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.worker.as_ref().map(|worker| worker.peer)
    }

    /// Take the pending inbound batch, or an empty list if none is ready.
    pub fn take_inbound(&mut self) -> Vec<Packet> {
        match &mut self.worker {
            Some(worker) => worker.inbound.try_recv().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Hand a console command to the pump.
    ///
    /// Returns false if the previous command hasn't been sent yet or there is
    /// no live session; the caller keeps the command and retries later.
    pub fn try_send_command(&mut self, command: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        match &self.worker {
            Some(worker) => worker.outbound.try_send(command.to_owned()).is_ok(),
            None => false,
        }
    }

    /// Stop the pump and wait for its thread.
    pub fn shutdown(&mut self) {
        self.state.store(SessionState::Disconnected);
        if let Some(worker) = self.worker.take() {
            drop(worker);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owns one pump thread and the foreground ends of its mailboxes.
///
/// Dropping the worker cancels the pump and joins the thread.
#[derive(Debug)]
struct SessionWorker {
    thread: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    inbound: mpsc::Receiver<Vec<Packet>>,
    outbound: mpsc::Sender<String>,
    peer: SocketAddr,
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
        let Some(thread) = self.thread.take() else { return };
        if thread.join().is_err() {
            warn!(peer = %self.peer, "Session thread panicked");
        }
    }
}
