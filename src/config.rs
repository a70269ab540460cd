//! Client configuration

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::{Result, TelemetryError};

/// Multicast group emitters announce themselves on.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 127, 251, 37);
/// UDP port of the discovery multicast group.
pub const DEFAULT_DISCOVERY_PORT: u16 = 30866;
/// TCP port emitters accept sessions on when a beacon doesn't say otherwise.
pub const DEFAULT_SESSION_PORT: u16 = 51072;

/// Tunables for discovery, the session transport and the data store.
///
/// Every field has a default, so a partial document deserializes cleanly:
///
/// ```rust
/// use rearview::ClientConfig;
///
/// let config = ClientConfig { discovery_enabled: false, ..ClientConfig::default() };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Multicast group joined by the discovery loop
    pub multicast_group: Ipv4Addr,
    /// UDP port of the multicast group
    pub discovery_port: u16,
    /// Session port used when a caller connects with port 0
    pub default_session_port: u16,
    /// How often the discovery loop sends a probe beacon
    pub beacon_interval: Duration,
    /// Listings not refreshed within this window are evicted
    pub freshness_window: Duration,
    /// Whether the client runs the discovery loop at all
    pub discovery_enabled: bool,
    /// Upper bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Sleep between session pump iterations
    pub pump_interval: Duration,
    /// Bytes requested per non-blocking receive
    pub recv_buffer_size: usize,
    /// Largest frame payload accepted from an emitter
    pub max_frame_len: u32,
    /// Seconds of history each channel keeps by default
    pub default_display_duration: f64,
    /// Extra seconds kept beyond the display duration
    pub aging_slack: f64,
    /// Seconds of emitter time between aging passes
    pub aging_interval: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            default_session_port: DEFAULT_SESSION_PORT,
            beacon_interval: Duration::from_secs(2),
            freshness_window: Duration::from_secs(5),
            discovery_enabled: true,
            connect_timeout: Duration::from_secs(5),
            pump_interval: Duration::from_millis(1),
            recv_buffer_size: 1024,
            max_frame_len: 16 * 1024 * 1024,
            default_display_duration: 10.0,
            aging_slack: 1.0,
            aging_interval: 10.0,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_group.is_multicast() {
            return Err(TelemetryError::config_error(
                "multicast_group",
                format!("{} is not a multicast address", self.multicast_group),
            ));
        }

        for (field, value) in [
            ("beacon_interval", self.beacon_interval),
            ("freshness_window", self.freshness_window),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(TelemetryError::config_error(field, "must be non-zero"));
            }
        }

        if self.recv_buffer_size == 0 {
            return Err(TelemetryError::config_error("recv_buffer_size", "must be non-zero"));
        }

        if self.max_frame_len == 0 {
            return Err(TelemetryError::config_error("max_frame_len", "must be non-zero"));
        }

        for (field, value) in [
            ("default_display_duration", self.default_display_duration),
            ("aging_interval", self.aging_interval),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TelemetryError::config_error(field, format!("{value} must be positive")));
            }
        }

        if !(self.aging_slack.is_finite() && self.aging_slack >= 0.0) {
            return Err(TelemetryError::config_error(
                "aging_slack",
                format!("{} must be zero or positive", self.aging_slack),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unicast_group() {
        let config =
            ClientConfig { multicast_group: Ipv4Addr::new(10, 0, 0, 1), ..ClientConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TelemetryError::Config { ref field, .. } if field == "multicast_group"));
    }

    #[test]
    fn rejects_zero_and_negative_values() {
        let zero_interval =
            ClientConfig { beacon_interval: Duration::ZERO, ..ClientConfig::default() };
        assert!(zero_interval.validate().is_err());

        let zero_buffer = ClientConfig { recv_buffer_size: 0, ..ClientConfig::default() };
        assert!(zero_buffer.validate().is_err());

        let negative_duration =
            ClientConfig { default_display_duration: -1.0, ..ClientConfig::default() };
        assert!(negative_duration.validate().is_err());

        let nan_slack = ClientConfig { aging_slack: f64::NAN, ..ClientConfig::default() };
        assert!(nan_slack.validate().is_err());
    }
}
