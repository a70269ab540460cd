//! Length-prefixed framing for the emitter-to-client stream
//!
//! Every frame is `[length: u32, big-endian][length bytes of packet payload]`.
//! A receive call may end anywhere inside a frame, including inside the
//! length prefix, so [`FrameDecoder`] carries the unconsumed tail over to the
//! next call.
//!
//! Console commands travel the other way as `[UTF-8 text][0x00]` with no
//! length prefix; see [`encode_command`].

use tracing::trace;

use super::Packet;
use crate::{Result, TelemetryError};

/// Width of the frame length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Build one complete frame for `packet`.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>> {
    let payload = packet.encode()?;
    let length = u32::try_from(payload.len())
        .map_err(|_| TelemetryError::FrameTooLarge { length: u32::MAX, max: u32::MAX })?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Encode an outbound console command: the text followed by a single NUL.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(0);
    bytes
}

/// Incremental frame reassembler.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes of an incomplete trailing frame from earlier receives
    leftover: Vec<u8>,
    max_frame_len: u32,
}

impl FrameDecoder {
    pub fn new(max_frame_len: u32) -> Self {
        Self { leftover: Vec::new(), max_frame_len }
    }

    /// Feed received bytes and return every packet completed by them, in
    /// wire order.
    ///
    /// An oversize length prefix or an undecodable payload poisons the stream;
    /// the caller is expected to drop the session.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Packet>> {
        self.leftover.extend_from_slice(bytes);

        let mut packets = Vec::new();
        let mut cursor = 0;

        let outcome = loop {
            let remaining = &self.leftover[cursor..];
            if remaining.len() < LENGTH_PREFIX_LEN {
                break Ok(());
            }

            let length = u32::from_be_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]);
            if length > self.max_frame_len {
                break Err(TelemetryError::FrameTooLarge { length, max: self.max_frame_len });
            }

            let frame_end = LENGTH_PREFIX_LEN + length as usize;
            if remaining.len() < frame_end {
                trace!(have = remaining.len(), need = frame_end, "Partial frame, waiting for more");
                break Ok(());
            }

            match Packet::decode(&remaining[LENGTH_PREFIX_LEN..frame_end]) {
                Ok(packet) => packets.push(packet),
                Err(e) => break Err(e),
            }

            cursor += frame_end;
        };

        self.leftover.drain(..cursor);
        outcome.map(|()| packets)
    }

    /// Number of buffered bytes belonging to an incomplete frame.
    pub fn pending_len(&self) -> usize {
        self.leftover.len()
    }
}
