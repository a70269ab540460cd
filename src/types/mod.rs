//! Core types for the telemetry data model.
//!
//! ## Architecture
//!
//! - [`ChannelType`] and [`Value`] describe what a channel carries
//! - [`ChannelSchema`] holds one registration epoch: [`Channel`]s indexed by
//!   handle plus their [`Group`]s
//! - [`TimeSeries`] stores a channel's samples, one variant per channel type
//! - [`Color`] assigns each channel a stable display color
//!
//! ## Usage Example
//!
//! ```rust
//! use rearview::protocol::{DataChannel, Packet};
//! use rearview::types::{ChannelSchema, ChannelType, TimeSeries, Value};
//!
//! let registration = Packet::registration(
//!     vec![DataChannel::new(0, "temp", ChannelType::Float)],
//!     Vec::new(),
//!     Vec::new(),
//! );
//! let schema = ChannelSchema::from_registration(&registration, 10.0).unwrap();
//!
//! let temp = schema.channel(0).unwrap();
//! let mut series = TimeSeries::new(temp.data_type);
//! series.push(1.0, Value::Float(21.5)).unwrap();
//! assert_eq!(series.len(), 1);
//! ```

mod channel_type;
mod color;
mod schema;
mod series;

pub use channel_type::{ChannelType, Value, Vector3};
pub use color::{Color, PALETTE};
pub use schema::{Channel, ChannelSchema, Group};
pub use series::{Sample, TimeSeries};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DataChannel, Packet};
    use proptest::prelude::*;

    fn arb_channel_type() -> impl Strategy<Value = ChannelType> {
        prop::sample::select(vec![ChannelType::Int, ChannelType::Float, ChannelType::Vector])
    }

    proptest! {
        #[test]
        fn prop_registered_types_match_declared_types(
            types in prop::collection::vec(arb_channel_type(), 1..24)
        ) {
            let channels = types
                .iter()
                .enumerate()
                .map(|(i, t)| DataChannel::new(i as u32, format!("ch{i}"), *t))
                .collect();
            let packet = Packet::registration(channels, Vec::new(), Vec::new());

            let schema = ChannelSchema::from_registration(&packet, 10.0).unwrap();
            prop_assert_eq!(schema.channel_count(), types.len());
            for (handle, declared) in types.iter().enumerate() {
                prop_assert_eq!(schema.channel(handle as u32).unwrap().data_type, *declared);
                prop_assert_eq!(schema.channel(handle as u32).unwrap().color, Color::for_index(handle));
            }
        }

        #[test]
        fn prop_misnumbered_registration_is_rejected(
            types in prop::collection::vec(arb_channel_type(), 2..16),
            victim in any::<prop::sample::Index>(),
            offset in 1u32..100
        ) {
            let victim = victim.index(types.len());
            let channels = types
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let handle = if i == victim { i as u32 + offset } else { i as u32 };
                    DataChannel::new(handle, format!("ch{i}"), *t)
                })
                .collect();
            let packet = Packet::registration(channels, Vec::new(), Vec::new());

            prop_assert!(ChannelSchema::from_registration(&packet, 10.0).is_err());
        }

        #[test]
        fn prop_mismatched_sample_is_detected(
            declared in arb_channel_type(),
            pushed in arb_channel_type(),
            time in 0.0f64..1e6
        ) {
            let mut series = TimeSeries::new(declared);
            let value = match pushed {
                ChannelType::Int => Value::Int(1),
                ChannelType::Float => Value::Float(1.0),
                ChannelType::Vector => Value::Vector(Vector3::new(1.0, 2.0, 3.0)),
            };

            let result = series.push(time, value);
            prop_assert_eq!(result.is_ok(), declared == pushed);
            prop_assert_eq!(series.len(), usize::from(declared == pushed));
        }
    }
}
