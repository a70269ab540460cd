//! Freshness-ranked table of advertised emitters

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

/// One advertised emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerListing {
    pub address: Ipv4Addr,
    /// TCP session port from the emitter's beacon
    pub port: u16,
    /// When the last beacon from this emitter arrived
    pub last_seen: Instant,
}

impl ServerListing {
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }

    /// Time since the last beacon.
    pub fn age(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

/// Emitters keyed by `(address, port)`.
///
/// The clock is passed in by the caller so eviction and ranking are
/// deterministic for a given table.
#[derive(Debug, Default)]
pub struct ServerTable {
    servers: BTreeMap<SocketAddrV4, ServerListing>,
}

impl ServerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a listing. Returns true if the emitter is new.
    pub fn upsert(&mut self, address: Ipv4Addr, port: u16, now: Instant) -> bool {
        let key = SocketAddrV4::new(address, port);
        self.servers.insert(key, ServerListing { address, port, last_seen: now }).is_none()
    }

    /// Remove listings not refreshed within `window` of `now`.
    pub fn evict_stale(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.servers.len();
        self.servers.retain(|_, listing| now.saturating_duration_since(listing.last_seen) < window);
        before - self.servers.len()
    }

    /// Copy of every listing, freshest first; ties go to the lower address,
    /// then the lower port.
    pub fn snapshot(&self) -> Vec<ServerListing> {
        let mut listings: Vec<ServerListing> = self.servers.values().copied().collect();
        listings.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.address.cmp(&b.address))
                .then_with(|| a.port.cmp(&b.port))
        });
        listings
    }

    /// The emitter a client should connect to.
    pub fn best(&self) -> Option<ServerListing> {
        self.snapshot().into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn upsert_refreshes_existing_listing() {
        let start = Instant::now();
        let mut table = ServerTable::new();

        assert!(table.upsert(Ipv4Addr::new(10, 0, 0, 2), 51072, start));
        assert!(!table.upsert(Ipv4Addr::new(10, 0, 0, 2), 51072, start + Duration::from_secs(3)));

        assert_eq!(table.len(), 1);
        assert_eq!(table.best().unwrap().last_seen, start + Duration::from_secs(3));
    }

    #[test]
    fn stale_listing_is_evicted() {
        let start = Instant::now();
        let mut table = ServerTable::new();
        table.upsert(Ipv4Addr::new(10, 0, 0, 2), 51072, start);
        table.upsert(Ipv4Addr::new(10, 0, 0, 3), 51072, start + Duration::from_secs(4));

        let removed = table.evict_stale(start + Duration::from_secs(6), WINDOW);

        assert_eq!(removed, 1);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].address, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn freshest_listing_wins() {
        let start = Instant::now();
        let mut table = ServerTable::new();
        table.upsert(Ipv4Addr::new(10, 0, 0, 1), 51072, start);
        table.upsert(Ipv4Addr::new(10, 0, 0, 9), 51072, start + Duration::from_millis(10));

        assert_eq!(table.best().unwrap().address, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn equal_freshness_resolves_to_lower_address() {
        let now = Instant::now();
        let mut table = ServerTable::new();
        table.upsert(Ipv4Addr::new(192, 168, 1, 20), 51072, now);
        table.upsert(Ipv4Addr::new(192, 168, 1, 4), 51072, now);
        table.upsert(Ipv4Addr::new(192, 168, 1, 4), 40000, now);

        let best = table.best().unwrap();
        assert_eq!(best.socket_addr(), "192.168.1.4:40000".parse().unwrap());
    }

    #[test]
    fn empty_table_has_no_best() {
        assert!(ServerTable::new().best().is_none());
        assert!(ServerTable::new().is_empty());
    }

    proptest! {
        #[test]
        fn prop_selection_ignores_insertion_order(
            entries in prop::collection::vec((any::<u32>(), 1u16..u16::MAX, 0u64..4), 1..20),
            seed in any::<u64>()
        ) {
            let base = Instant::now();
            let mut forward = ServerTable::new();
            for (ip, port, offset) in &entries {
                forward.upsert(Ipv4Addr::from(*ip), *port, base + Duration::from_secs(*offset));
            }

            // Same final table built in a rotated order.
            let mut reordered = entries.clone();
            let shift = (seed as usize) % reordered.len();
            reordered.rotate_left(shift);

            let mut rotated = ServerTable::new();
            for (ip, port, offset) in &reordered {
                rotated.upsert(Ipv4Addr::from(*ip), *port, base + Duration::from_secs(*offset));
            }

            // Duplicate keys keep the last write, which differs between orders; compare
            // only when every key is unique.
            let mut keys: Vec<(u32, u16)> = entries.iter().map(|(ip, port, _)| (*ip, *port)).collect();
            keys.sort_unstable();
            keys.dedup();
            if keys.len() == entries.len() {
                prop_assert_eq!(forward.best(), rotated.best());
                prop_assert_eq!(forward.snapshot(), rotated.snapshot());
            }
        }
    }
}
