//! Passive BEP 14 Local Service Discovery listener.
//!
//! Peers on the local network multicast `BT-SEARCH` messages for the torrents
//! they are interested in. We never send our own searches; every received
//! info hash is surfaced as an announce event.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SwarmEvent;

/// IPv4 multicast group used by LSD.
pub const LSD_GROUP_V4: Ipv4Addr = Ipv4Addr::new(239, 192, 152, 143);

/// Default LSD port.
pub const LSD_PORT: u16 = 6771;

const MAX_DATAGRAM: usize = 1500;

/// Bind a UDP socket and join the LSD multicast group.
pub fn bind(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = StdUdpSocket::bind(addr)?;
    socket.join_multicast_v4(&LSD_GROUP_V4, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket)
}

/// Parse a `BT-SEARCH` datagram.
///
/// Returns every `Infohash:` header value together with the advertised port.
/// Hash values are returned verbatim; validation is left to the classifier.
pub fn parse_search_message(data: &[u8]) -> Option<(Vec<String>, Option<u16>)> {
    let text = std::str::from_utf8(data).ok()?;
    let mut lines = text.lines();

    let request_line = lines.next()?.trim();
    if !request_line.starts_with("BT-SEARCH") {
        return None;
    }

    let mut hashes = Vec::new();
    let mut port = None;
    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("infohash") {
            if !value.is_empty() {
                hashes.push(value.to_string());
            }
        } else if key.trim().eq_ignore_ascii_case("port") {
            port = value.parse::<u16>().ok();
        }
    }

    if hashes.is_empty() {
        None
    } else {
        Some((hashes, port))
    }
}

/// Convert a datagram into announce events.
pub fn events_from_datagram(data: &[u8], source: SocketAddr) -> Vec<SwarmEvent> {
    let Some((hashes, port)) = parse_search_message(data) else {
        return Vec::new();
    };

    let peer = match port {
        Some(port) => SocketAddr::new(source.ip(), port),
        None => source,
    };

    hashes
        .into_iter()
        .map(|info_hash| SwarmEvent::Announce {
            message: format!("lsd announce for {} from peer {}", info_hash, peer),
            info_hash,
            name: None,
        })
        .collect()
}

/// Spawn the receive loop. Events are dropped when the queue is full.
pub fn spawn_listener(socket: UdpSocket, tx: mpsc::Sender<SwarmEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Ok(addr) = socket.local_addr() {
            info!(addr = %addr, "LSD listener started");
        }

        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, source)) => {
                    for event in events_from_datagram(&buf[..n], source) {
                        if tx.try_send(event).is_err() {
                            debug!("Event queue full, dropping LSD announce");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "LSD receive failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }

            if tx.is_closed() {
                break;
            }
        }

        info!("LSD listener stopped");
    })
}
