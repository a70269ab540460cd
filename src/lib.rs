//! Client-side transport and data model for live application telemetry.
//!
//! An instrumented application (the emitter) streams typed channels and
//! console text over TCP. Rearview finds emitters on the local network,
//! keeps one session open to the best of them, and turns the packet stream
//! into a queryable, aged time-series model.
//!
//! # Features
//!
//! - **Discovery**: UDP multicast beacons with a freshness-ranked server table
//! - **Session**: background pump with length-prefixed framing and
//!   capacity-one mailboxes in each direction
//! - **Data store**: registration epochs, typed per-channel series, aging and
//!   emitter clock prediction
//! - **Facade**: a single [`Client::update`] tick that ties it all together
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rearview::{Client, ClientCallbacks, ClientConfig, types::ChannelType};
//!
//! fn main() -> rearview::Result<()> {
//!     let mut client = Client::initialize(ClientConfig::default(), ClientCallbacks::new())?;
//!
//!     loop {
//!         client.update();
//!         for channel in client.channels() {
//!             if channel.data_type == ChannelType::Float {
//!                 let now = client.predict_current_time();
//!                 println!("{} @ {now:.2}s: {:?}", channel.name, client.series(channel.handle));
//!             }
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod protocol;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Runtime components
pub mod client;
pub mod discovery;
pub mod session;
pub mod store;

// Core exports
pub use config::ClientConfig;
pub use error::*;

// Main API exports
pub use client::{Client, ClientCallbacks};
pub use discovery::{Discovery, ServerListing};
pub use session::{Session, SessionState};
pub use store::{DataStore, StoreEvent};
