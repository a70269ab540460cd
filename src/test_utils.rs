//! Test utilities: packet builders and an in-process emitter
//!
//! [`LoopbackEmitter`] plays the emitter side of a session on `127.0.0.1` so
//! session and client tests can run without a real instrumented application.

#![cfg(any(test, feature = "benchmark"))]

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};

use crate::protocol::{DataChannel, DataGroup, DataLabel, Packet, encode_frame};
use crate::types::{ChannelType, Value};

/// Install a tracing subscriber for tests, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Registration for a single Float channel named `name` at handle 0.
pub fn float_channel_registration(name: &str) -> Packet {
    Packet::registration(vec![DataChannel::new(0, name, ChannelType::Float)], Vec::new(), Vec::new())
}

/// Registration exercising every channel type, a group and labels.
///
/// Handles: 0 `gear` (Int, labelled), 1 `speed` (Float, ranged),
/// 2 `position` (Vector). Group `drivetrain` holds 0 and 1.
pub fn mixed_registration() -> Packet {
    Packet::registration(
        vec![
            DataChannel::new(0, "gear", ChannelType::Int),
            DataChannel::new(1, "speed", ChannelType::Float).with_range(0.0, 120.0),
            DataChannel::new(2, "position", ChannelType::Vector),
        ],
        vec![DataGroup { name: "drivetrain".into(), channels: vec![0, 1] }],
        vec![
            DataLabel { handle: 0, value: -1, name: "reverse".into() },
            DataLabel { handle: 0, value: 0, name: "neutral".into() },
        ],
    )
}

/// Float samples for `handle`, one per `(time, value)` pair.
pub fn float_samples(handle: u32, points: &[(f64, f32)]) -> Vec<Packet> {
    points.iter().map(|&(time, value)| Packet::sample(handle, time, Value::Float(value))).collect()
}

/// Concatenated frames for `packets`, as an emitter would write them.
pub fn encoded_stream(packets: &[Packet]) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for packet in packets {
        bytes.extend(encode_frame(packet).context("encoding test frame")?);
    }
    Ok(bytes)
}

/// Emitter side of a loopback session.
#[derive(Debug)]
pub struct LoopbackEmitter {
    listener: TcpListener,
}

impl LoopbackEmitter {
    /// Listen on an ephemeral loopback port.
    pub fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).context("binding emitter")?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> anyhow::Result<u16> {
        Ok(self.listener.local_addr().context("emitter address")?.port())
    }

    /// Wait for the client to connect.
    pub fn accept(&self, timeout: Duration) -> anyhow::Result<EmitterConnection> {
        self.listener.set_nonblocking(true)?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_read_timeout(Some(timeout))?;
                    return Ok(EmitterConnection { stream, peer });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        bail!("no client connected within {timeout:?}");
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(e).context("accepting client"),
            }
        }
    }
}

/// One accepted client connection.
#[derive(Debug)]
pub struct EmitterConnection {
    stream: TcpStream,
    pub peer: SocketAddr,
}

impl EmitterConnection {
    pub fn send(&mut self, packet: &Packet) -> anyhow::Result<()> {
        self.send_raw(&encode_frame(packet)?)
    }

    pub fn send_all(&mut self, packets: &[Packet]) -> anyhow::Result<()> {
        self.send_raw(&encoded_stream(packets)?)
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.stream.write_all(bytes).context("writing to client")?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read one NUL-terminated console command.
    pub fn read_command(&mut self) -> anyhow::Result<String> {
        let mut command = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.stream.read(&mut byte).context("reading command")?;
            if n == 0 {
                bail!("client closed before command terminator");
            }
            if byte[0] == 0 {
                return String::from_utf8(command).context("command is not UTF-8");
            }
            command.push(byte[0]);
        }
    }

    /// True once the client has closed its end.
    pub fn wait_for_close(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
            Err(e) if e.kind() == ErrorKind::ConnectionReset => Ok(true),
            Err(e) => Err(e).context("waiting for client close"),
        }
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
