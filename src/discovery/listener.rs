//! Beacon loop: probes the multicast group and records emitter announcements.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::table::{ServerListing, ServerTable};
use crate::config::ClientConfig;
use crate::protocol::{Beacon, BeaconKind};

const DATAGRAM_BUFFER: usize = 512;

/// Thread entry point: runs the beacon loop on a current-thread runtime until
/// `cancel` fires.
pub(crate) fn run(config: ClientConfig, table: Arc<Mutex<ServerTable>>, cancel: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Could not build discovery runtime, discovery disabled");
            return;
        }
    };

    runtime.block_on(beacon_loop(config, table, cancel));
}

async fn beacon_loop(config: ClientConfig, table: Arc<Mutex<ServerTable>>, cancel: CancellationToken) {
    info!(
        group = %config.multicast_group,
        port = config.discovery_port,
        interval_ms = config.beacon_interval.as_millis() as u64,
        "Discovery loop started"
    );

    loop {
        let socket = match make_multicast_socket(&config).and_then(UdpSocket::from_std) {
            Ok(socket) => socket,
            Err(e) => {
                warn!(error = %e, "Could not open discovery socket, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.beacon_interval) => continue,
                }
            }
        };

        listen(&socket, &config, &table, &cancel).await;
        break;
    }

    info!("Discovery loop ended");
}

async fn listen(
    socket: &UdpSocket,
    config: &ClientConfig,
    table: &Mutex<ServerTable>,
    cancel: &CancellationToken,
) {
    let destination = SocketAddrV4::new(config.multicast_group, config.discovery_port);
    let probe = match Beacon::probe().encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Could not encode probe beacon");
            return;
        }
    };

    let mut beacon = interval(config.beacon_interval);
    beacon.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep = interval(config.freshness_window.min(Duration::from_secs(1)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buf = vec![0u8; DATAGRAM_BUFFER];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Discovery cancelled");
                break;
            }
            _ = beacon.tick() => {
                match socket.send_to(&probe, destination).await {
                    Ok(n) => trace!(bytes = n, "Probe sent"),
                    Err(e) => warn!(error = %e, "Probe send failed"),
                }
            }
            _ = sweep.tick() => {
                let removed = table.lock().evict_stale(Instant::now(), config.freshness_window);
                if removed > 0 {
                    debug!(removed, "Expired stale emitters");
                }
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    record_beacon(table, &buf[..len], from, Instant::now());
                }
                Err(e) => warn!(error = %e, "Discovery receive failed"),
            },
        }
    }
}

/// Decode one datagram and upsert the announcing emitter.
///
/// Returns the refreshed listing, or `None` for probes and foreign traffic.
pub(crate) fn record_beacon(
    table: &Mutex<ServerTable>,
    datagram: &[u8],
    from: SocketAddr,
    now: Instant,
) -> Option<ServerListing> {
    let beacon = match Beacon::decode(datagram) {
        Ok(beacon) => beacon,
        Err(e) => {
            trace!(%from, error = %e, "Ignoring undecodable datagram");
            return None;
        }
    };

    let BeaconKind::Announce { session_port } = beacon.kind else {
        trace!(%from, "Ignoring probe");
        return None;
    };

    let SocketAddr::V4(sender) = from else {
        trace!(%from, "Ignoring IPv6 announcement");
        return None;
    };

    let listing = ServerListing { address: *sender.ip(), port: session_port, last_seen: now };
    if table.lock().upsert(listing.address, listing.port, now) {
        info!(address = %listing.address, port = session_port, "Discovered emitter");
    }
    Some(listing)
}

/// UDP socket bound to the discovery port and joined to the multicast group.
fn make_multicast_socket(config: &ClientConfig) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.set_multicast_loop_v4(true)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.discovery_port);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&config.multicast_group, &Ipv4Addr::UNSPECIFIED)?;

    Ok(socket.into())
}
