//! Per-channel sample storage

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{ChannelType, Value, Vector3};

/// One timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Sample<T> {
    /// Emitter timestamp in seconds
    pub time: f64,
    pub value: T,
}

impl<T> Sample<T> {
    pub const fn new(time: f64, value: T) -> Self {
        Self { time, value }
    }
}

/// Arrival-ordered samples for one channel, specialized by channel type.
///
/// Samples are appended at the tail and aged out from the head. Out-of-order
/// network delivery is kept in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeSeries {
    Int(VecDeque<Sample<i32>>),
    Float(VecDeque<Sample<f32>>),
    Vector(VecDeque<Sample<Vector3>>),
}

impl TimeSeries {
    /// Empty series able to hold samples of `data_type`.
    pub fn new(data_type: ChannelType) -> Self {
        match data_type {
            ChannelType::Int => TimeSeries::Int(VecDeque::new()),
            ChannelType::Float => TimeSeries::Float(VecDeque::new()),
            ChannelType::Vector => TimeSeries::Vector(VecDeque::new()),
        }
    }

    pub fn data_type(&self) -> ChannelType {
        match self {
            TimeSeries::Int(_) => ChannelType::Int,
            TimeSeries::Float(_) => ChannelType::Float,
            TimeSeries::Vector(_) => ChannelType::Vector,
        }
    }

    /// Append a sample. Fails if `value` doesn't match the series type.
    pub fn push(&mut self, time: f64, value: Value) -> crate::Result<()> {
        match (self, value) {
            (TimeSeries::Int(samples), Value::Int(v)) => samples.push_back(Sample::new(time, v)),
            (TimeSeries::Float(samples), Value::Float(v)) => {
                samples.push_back(Sample::new(time, v))
            }
            (TimeSeries::Vector(samples), Value::Vector(v)) => {
                samples.push_back(Sample::new(time, v))
            }
            (series, value) => {
                return Err(crate::TelemetryError::protocol_violation(format!(
                    "Sample of type {} pushed to {} series",
                    value.channel_type(),
                    series.data_type()
                )));
            }
        }
        Ok(())
    }

    /// Most recent sample as a runtime value.
    pub fn last(&self) -> Option<Sample<Value>> {
        match self {
            TimeSeries::Int(s) => s.back().map(|x| Sample::new(x.time, Value::Int(x.value))),
            TimeSeries::Float(s) => s.back().map(|x| Sample::new(x.time, Value::Float(x.value))),
            TimeSeries::Vector(s) => s.back().map(|x| Sample::new(x.time, Value::Vector(x.value))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TimeSeries::Int(s) => s.len(),
            TimeSeries::Float(s) => s.len(),
            TimeSeries::Vector(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp at the head of the series.
    pub fn oldest_time(&self) -> Option<f64> {
        match self {
            TimeSeries::Int(s) => s.front().map(|x| x.time),
            TimeSeries::Float(s) => s.front().map(|x| x.time),
            TimeSeries::Vector(s) => s.front().map(|x| x.time),
        }
    }

    /// Timestamp at the tail of the series.
    pub fn newest_time(&self) -> Option<f64> {
        self.last().map(|sample| sample.time)
    }

    /// Pop head samples older than `cutoff`. Stops at the first sample that
    /// is not older, so late arrivals behind it survive until it ages out.
    pub fn drop_older_than(&mut self, cutoff: f64) -> usize {
        fn drain<T>(samples: &mut VecDeque<Sample<T>>, cutoff: f64) -> usize {
            let mut dropped = 0;
            while samples.front().is_some_and(|sample| sample.time < cutoff) {
                samples.pop_front();
                dropped += 1;
            }
            dropped
        }

        match self {
            TimeSeries::Int(s) => drain(s, cutoff),
            TimeSeries::Float(s) => drain(s, cutoff),
            TimeSeries::Vector(s) => drain(s, cutoff),
        }
    }

    pub fn as_int(&self) -> Option<&VecDeque<Sample<i32>>> {
        match self {
            TimeSeries::Int(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&VecDeque<Sample<f32>>> {
        match self {
            TimeSeries::Float(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&VecDeque<Sample<Vector3>>> {
        match self {
            TimeSeries::Vector(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_mismatched_type() {
        let mut series = TimeSeries::new(ChannelType::Float);
        assert!(series.push(1.0, Value::Float(1.0)).is_ok());

        let err = series.push(2.0, Value::Int(1)).unwrap_err();
        assert!(matches!(err, crate::TelemetryError::Protocol { .. }));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn keeps_arrival_order() {
        let mut series = TimeSeries::new(ChannelType::Int);
        for (time, value) in [(1.0, 1), (3.0, 3), (2.0, 2)] {
            series.push(time, Value::Int(value)).unwrap();
        }

        let times: Vec<f64> = series.as_int().unwrap().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 2.0]);
        assert_eq!(series.newest_time(), Some(2.0));
    }

    #[test]
    fn drops_only_from_head() {
        let mut series = TimeSeries::new(ChannelType::Vector);
        for time in [1.0, 2.0, 3.0, 4.0] {
            series.push(time, Value::Vector(Vector3::new(time as f32, 0.0, 0.0))).unwrap();
        }

        assert_eq!(series.drop_older_than(2.5), 2);
        assert_eq!(series.oldest_time(), Some(3.0));
        assert_eq!(series.len(), 2);
        assert_eq!(series.drop_older_than(0.0), 0);
    }

    #[test]
    fn typed_accessors_match_variant() {
        let series = TimeSeries::new(ChannelType::Float);
        assert!(series.as_float().is_some());
        assert!(series.as_int().is_none());
        assert!(series.as_vector().is_none());
        assert!(series.last().is_none());
    }
}
