//! Packet envelope exchanged with emitters
//!
//! Each frame on a session carries exactly one [`Packet`]. Every sub-message is
//! optional; an emitter typically populates one of them per packet, except for
//! the registration handshake which carries channels, groups and labels together.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{ChannelType, Value};

/// One sample for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    /// Channel handle from the current registration
    pub handle: u32,
    /// Emitter timestamp in seconds
    pub time: f64,
    /// Sample value; must match the channel's declared type
    pub value: Value,
    /// Set when the emitter skipped unchanged repeats since this time
    pub maintain_time: Option<f64>,
}

/// Channel registration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChannel {
    pub handle: u32,
    pub name: String,
    pub data_type: ChannelType,
    /// Declared `(min, max)` display range
    pub range: Option<(f32, f32)>,
}

/// Named group of channel handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGroup {
    pub name: String,
    pub channels: Vec<u32>,
}

/// Display label for one integer value of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLabel {
    pub handle: u32,
    pub value: i32,
    pub name: String,
}

/// Wire envelope carried by each frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Packet {
    pub data: Option<Data>,
    pub data_channels: Vec<DataChannel>,
    pub data_groups: Vec<DataGroup>,
    pub data_labels: Vec<DataLabel>,
    pub console_output: Option<String>,
    pub status: Option<String>,
}

impl Packet {
    /// Registration handshake packet.
    pub fn registration(
        channels: Vec<DataChannel>,
        groups: Vec<DataGroup>,
        labels: Vec<DataLabel>,
    ) -> Self {
        Self { data_channels: channels, data_groups: groups, data_labels: labels, ..Self::default() }
    }

    /// Single-sample data packet.
    pub fn sample(handle: u32, time: f64, value: Value) -> Self {
        Self {
            data: Some(Data { handle, time, value, maintain_time: None }),
            ..Self::default()
        }
    }

    /// Console text packet.
    pub fn console(text: impl Into<String>) -> Self {
        Self { console_output: Some(text.into()), ..Self::default() }
    }

    /// Status text packet.
    pub fn status(text: impl Into<String>) -> Self {
        Self { status: Some(text.into()), ..Self::default() }
    }

    /// Whether this packet opens a new registration epoch.
    pub fn is_registration(&self) -> bool {
        !self.data_channels.is_empty()
    }

    /// Serialize the packet payload (without the frame length prefix).
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_stdvec(self)?)
    }

    /// Deserialize one packet payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

impl DataChannel {
    pub fn new(handle: u32, name: impl Into<String>, data_type: ChannelType) -> Self {
        Self { handle, name: name.into(), data_type, range: None }
    }

    /// Attach a declared display range.
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;

    #[test]
    fn registration_flag_follows_channel_list() {
        let registration = Packet::registration(
            vec![DataChannel::new(0, "temp", ChannelType::Float)],
            Vec::new(),
            Vec::new(),
        );
        assert!(registration.is_registration());
        assert!(!Packet::sample(0, 1.0, Value::Float(2.0)).is_registration());
        assert!(!Packet::console("hello").is_registration());
    }

    #[test]
    fn decodes_what_the_emitter_encodes() {
        let mut packet = Packet::sample(2, 4.25, Value::Vector(Vector3::new(1.0, -2.0, 0.5)));
        packet.status = Some("running".to_string());

        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let bytes = Packet::console("a long console line").encode().unwrap();
        let err = Packet::decode(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, crate::TelemetryError::Decode { .. }));
    }
}
