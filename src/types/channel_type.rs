//! Telemetry channel type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported channel data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ChannelType {
    /// 32-bit signed integer, optionally labeled
    Int,
    /// 32-bit floating point
    Float,
    /// Three 32-bit floats
    Vector,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelType::Int => "int",
            ChannelType::Float => "float",
            ChannelType::Vector => "vector",
        };
        f.write_str(name)
    }
}

/// A three-component float vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Runtime value of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Value {
    Int(i32),
    Float(f32),
    Vector(Vector3),
}

impl Value {
    /// The channel type able to hold this value.
    pub const fn channel_type(&self) -> ChannelType {
        match self {
            Value::Int(_) => ChannelType::Int,
            Value::Float(_) => ChannelType::Float,
            Value::Vector(_) => ChannelType::Vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_reports_matching_type() {
        assert_eq!(Value::Int(3).channel_type(), ChannelType::Int);
        assert_eq!(Value::Float(0.5).channel_type(), ChannelType::Float);
        assert_eq!(Value::Vector(Vector3::new(1.0, 2.0, 3.0)).channel_type(), ChannelType::Vector);
    }

    #[test]
    fn display_uses_lowercase_names() {
        assert_eq!(ChannelType::Int.to_string(), "int");
        assert_eq!(ChannelType::Vector.to_string(), "vector");
    }
}
