//! Discovery beacon payload

use serde::{Deserialize, Serialize};

use crate::{Result, TelemetryError};

/// Magic prefix identifying rearview beacons on the shared multicast port.
pub const BEACON_MAGIC: [u8; 4] = *b"RVB1";

/// What a beacon announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeaconKind {
    /// Sent by clients; asks emitters to announce promptly
    Probe,
    /// Sent by emitters; advertises the TCP session port
    Announce { session_port: u16 },
}

/// One discovery datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub magic: [u8; 4],
    pub kind: BeaconKind,
}

impl Beacon {
    pub fn probe() -> Self {
        Self { magic: BEACON_MAGIC, kind: BeaconKind::Probe }
    }

    pub fn announce(session_port: u16) -> Self {
        Self { magic: BEACON_MAGIC, kind: BeaconKind::Announce { session_port } }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_stdvec(self)?)
    }

    /// Decode a datagram, rejecting foreign traffic on the same port.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let beacon: Beacon = postcard::from_bytes(bytes)?;
        if beacon.magic != BEACON_MAGIC {
            return Err(TelemetryError::decode_error(
                "beacon",
                format!("unexpected magic {:02x?}", beacon.magic),
            ));
        }
        Ok(beacon)
    }
}
