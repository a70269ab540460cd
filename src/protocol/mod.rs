//! Wire protocol: packet envelope, session framing and discovery beacons.

mod beacon;
mod frame;
mod packet;

pub use beacon::{BEACON_MAGIC, Beacon, BeaconKind};
pub use frame::{FrameDecoder, LENGTH_PREFIX_LEN, encode_command, encode_frame};
pub use packet::{Data, DataChannel, DataGroup, DataLabel, Packet};
