//! Channel schema types

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use super::{ChannelType, Color};
use crate::protocol::Packet;

/// Schema of one registration epoch: every channel plus its grouping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ChannelSchema {
    /// Channels indexed by handle
    pub channels: Vec<Channel>,
    /// Organizational groups, in registration order
    pub groups: Vec<Group>,
}

impl ChannelSchema {
    /// Build the schema carried by a registration packet.
    ///
    /// Channels must be listed in handle order starting at 0. Groups and
    /// labels may only reference registered handles.
    pub fn from_registration(packet: &Packet, display_duration: f64) -> crate::Result<Self> {
        let channels = packet
            .data_channels
            .iter()
            .enumerate()
            .map(|(index, registration)| Channel {
                handle: registration.handle,
                name: registration.name.clone(),
                data_type: registration.data_type,
                range: registration.range,
                labels: BTreeMap::new(),
                color: Color::for_index(index),
                display_duration,
                active: true,
            })
            .collect();

        let groups = packet
            .data_groups
            .iter()
            .map(|group| Group { name: group.name.clone(), channels: group.channels.clone() })
            .collect();

        let mut schema = Self { channels, groups };
        schema.validate()?;

        for label in &packet.data_labels {
            let channel = schema.channel_mut(label.handle).ok_or_else(|| {
                crate::TelemetryError::protocol_violation(format!(
                    "Label '{}' references unknown handle {}",
                    label.name, label.handle
                ))
            })?;
            channel.labels.insert(label.value, label.name.clone());
        }

        Ok(schema)
    }

    /// Validate the schema for consistency.
    pub fn validate(&self) -> crate::Result<()> {
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.handle as usize != index {
                return Err(crate::TelemetryError::protocol_violation(format!(
                    "Channel '{}' registered with handle {} at position {}",
                    channel.name, channel.handle, index
                )));
            }
        }

        for group in &self.groups {
            if let Some(&handle) =
                group.channels.iter().find(|&&handle| handle as usize >= self.channels.len())
            {
                return Err(crate::TelemetryError::protocol_violation(format!(
                    "Group '{}' references unknown handle {}",
                    group.name, handle
                )));
            }
        }

        Ok(())
    }

    /// Get a channel by handle.
    pub fn channel(&self, handle: u32) -> Option<&Channel> {
        self.channels.get(handle as usize)
    }

    pub fn channel_mut(&mut self, handle: u32) -> Option<&mut Channel> {
        self.channels.get_mut(handle as usize)
    }

    /// Find a group by name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Get the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total number of labels across all channels.
    pub fn label_count(&self) -> usize {
        self.channels.iter().map(|channel| channel.labels.len()).sum()
    }
}

/// A named, typed telemetry signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Channel {
    /// Dense handle, equal to the channel's registration position
    pub handle: u32,
    /// Field name as registered by the emitter
    pub name: String,
    /// Declared sample type
    pub data_type: ChannelType,
    /// Declared `(min, max)` display range
    pub range: Option<(f32, f32)>,
    /// Display strings for integer values
    pub labels: BTreeMap<i32, String>,
    /// Palette color assigned by position
    pub color: Color,
    /// Seconds of history retained for this channel
    pub display_duration: f64,
    /// Whether the emitter was asked to stream this channel
    pub active: bool,
}

impl Channel {
    /// Display text for `value`, falling back to its decimal form.
    pub fn label_for(&self, value: i32) -> Cow<'_, str> {
        match self.labels.get(&value) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(value.to_string()),
        }
    }

    pub fn has_label(&self, value: i32) -> bool {
        self.labels.contains_key(&value)
    }
}

/// Named, ordered collection of channel handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Group {
    pub name: String,
    pub channels: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DataChannel, DataGroup, DataLabel};
    use crate::types::PALETTE;

    fn registration(channels: Vec<DataChannel>) -> Packet {
        Packet::registration(channels, Vec::new(), Vec::new())
    }

    #[test]
    fn builds_channels_in_handle_order() {
        let mut packet = registration(vec![
            DataChannel::new(0, "temp", ChannelType::Float).with_range(-10.0, 50.0),
            DataChannel::new(1, "state", ChannelType::Int),
            DataChannel::new(2, "velocity", ChannelType::Vector),
        ]);
        packet.data_groups.push(DataGroup { name: "physics".to_string(), channels: vec![0, 2] });
        packet.data_labels.push(DataLabel { handle: 1, value: 0, name: "idle".to_string() });
        packet.data_labels.push(DataLabel { handle: 1, value: 1, name: "running".to_string() });

        let schema = ChannelSchema::from_registration(&packet, 5.0).unwrap();

        assert_eq!(schema.channel_count(), 3);
        assert_eq!(schema.label_count(), 2);
        assert_eq!(schema.channel(0).unwrap().range, Some((-10.0, 50.0)));
        assert_eq!(schema.channel(2).unwrap().data_type, ChannelType::Vector);
        assert_eq!(schema.channel(2).unwrap().color, PALETTE[2]);
        assert_eq!(schema.channel(1).unwrap().display_duration, 5.0);
        assert_eq!(schema.group("physics").unwrap().channels, vec![0, 2]);
        assert_eq!(schema.channel(1).unwrap().name, "state");
    }

    #[test]
    fn rejects_handle_not_matching_position() {
        let packet = registration(vec![
            DataChannel::new(0, "a", ChannelType::Int),
            DataChannel::new(2, "b", ChannelType::Int),
        ]);
        let err = ChannelSchema::from_registration(&packet, 5.0).unwrap_err();
        assert!(matches!(err, crate::TelemetryError::Protocol { .. }));
    }

    #[test]
    fn rejects_group_member_out_of_range() {
        let mut packet = registration(vec![DataChannel::new(0, "a", ChannelType::Int)]);
        packet.data_groups.push(DataGroup { name: "g".to_string(), channels: vec![0, 1] });
        assert!(ChannelSchema::from_registration(&packet, 5.0).is_err());
    }

    #[test]
    fn rejects_label_for_unknown_handle() {
        let mut packet = registration(vec![DataChannel::new(0, "a", ChannelType::Int)]);
        packet.data_labels.push(DataLabel { handle: 4, value: 1, name: "x".to_string() });
        assert!(ChannelSchema::from_registration(&packet, 5.0).is_err());
    }

    #[test]
    fn label_falls_back_to_decimal_text() {
        let mut packet = registration(vec![DataChannel::new(0, "gear", ChannelType::Int)]);
        packet.data_labels.push(DataLabel { handle: 0, value: -1, name: "reverse".to_string() });
        let schema = ChannelSchema::from_registration(&packet, 5.0).unwrap();
        let gear = schema.channel(0).unwrap();

        assert!(gear.has_label(-1));
        assert_eq!(gear.label_for(-1), "reverse");
        assert!(!gear.has_label(3));
        assert_eq!(gear.label_for(3), "3");
    }
}
