//! Emitter discovery over UDP multicast.
//!
//! A background thread joins the discovery group, periodically sends a probe
//! beacon and records every announce beacon it hears into a shared
//! [`ServerTable`]. Listings that stop announcing are evicted once they fall
//! outside the configured freshness window.
//!
//! ```no_run
//! use rearview::{ClientConfig, Discovery};
//!
//! # fn main() -> rearview::Result<()> {
//! let discovery = Discovery::start(&ClientConfig::default())?;
//! if let Some(best) = discovery.best_server() {
//!     println!("emitter at {}", best.socket_addr());
//! }
//! discovery.join();
//! # Ok(())
//! # }
//! ```

mod listener;
mod table;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::{Result, TelemetryError};

#[cfg(test)]
pub(crate) use listener::record_beacon;
pub use table::{ServerListing, ServerTable};

/// Handle to the running discovery loop.
///
/// Dropping the handle stops the loop and waits for its thread.
#[derive(Debug)]
pub struct Discovery {
    table: Arc<Mutex<ServerTable>>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    freshness_window: Duration,
}

impl Discovery {
    /// Spawn the discovery thread.
    ///
    /// Socket failures inside the loop are retried; only an invalid config
    /// or a failure to spawn the thread is reported here.
    pub fn start(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let table = Arc::new(Mutex::new(ServerTable::new()));
        let cancel = CancellationToken::new();

        let thread = std::thread::Builder::new()
            .name("rearview-discovery".into())
            .spawn({
                let config = config.clone();
                let table = Arc::clone(&table);
                let cancel = cancel.clone();
                move || listener::run(config, table, cancel)
            })
            .map_err(|e| TelemetryError::io_error("spawning discovery thread", e))?;

        Ok(Self {
            table,
            cancel,
            thread: Some(thread),
            freshness_window: config.freshness_window,
        })
    }

    /// Fresh listings, freshest first.
    pub fn servers(&self) -> Vec<ServerListing> {
        let mut table = self.table.lock();
        table.evict_stale(Instant::now(), self.freshness_window);
        table.snapshot()
    }

    /// Freshest listing, if any emitter is currently announcing.
    pub fn best_server(&self) -> Option<ServerListing> {
        self.servers().into_iter().next()
    }

    /// Ask the loop to stop without waiting for it.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop the loop and wait for its thread to exit.
    pub fn join(mut self) {
        self.stop_and_join();
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &Mutex<ServerTable> {
        &self.table
    }

    fn stop_and_join(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Discovery thread panicked");
            } else {
                debug!("Discovery thread joined");
            }
        }
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Beacon;
    use std::net::{Ipv4Addr, SocketAddr};

    fn isolated_config() -> ClientConfig {
        // Unused port so a real emitter on the LAN can't leak into the table.
        ClientConfig {
            discovery_port: 39_411,
            beacon_interval: Duration::from_millis(50),
            freshness_window: Duration::from_millis(200),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn start_and_join_without_emitters() {
        let discovery = Discovery::start(&isolated_config()).unwrap();
        assert!(discovery.servers().is_empty());
        assert!(discovery.best_server().is_none());
        discovery.join();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let discovery = Discovery::start(&isolated_config()).unwrap();
        discovery.shutdown();
        discovery.shutdown();
        drop(discovery);
    }

    #[test]
    fn recorded_beacon_is_visible_then_expires() {
        let config = isolated_config();
        let discovery = Discovery::start(&config).unwrap();
        let datagram = Beacon::announce(6000).encode().unwrap();
        let sender = SocketAddr::from(([127, 0, 0, 1], config.discovery_port));

        record_beacon(discovery.table(), &datagram, sender, Instant::now());

        let best = discovery.best_server().expect("announced emitter");
        assert_eq!(best.address, Ipv4Addr::LOCALHOST);
        assert_eq!(best.port, 6000);

        std::thread::sleep(config.freshness_window + Duration::from_millis(50));
        assert!(discovery.servers().is_empty());
    }
}
