//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits so
//! the whole pipeline can be exercised without a live swarm.
//!
//! # Example
//!
//! ```rust,ignore
//! use swarmwatch_core::testing::{fixtures, MemoryOutcomeSink, MockSwarmObserver};
//!
//! let observer = MockSwarmObserver::new();
//! let hash = fixtures::info_hash(0xAB);
//!
//! observer.push_events(vec![fixtures::announce(&hash, "Ubuntu")]).await;
//! observer.set_metadata_ready(&hash, fixtures::magnet_info("Ubuntu", &[("ubuntu.iso", 1)])).await;
//! ```

mod failing_record_store;
mod memory_outcome_sink;
mod mock_swarm_observer;

pub use failing_record_store::FailingRecordStore;
pub use memory_outcome_sink::MemoryOutcomeSink;
pub use mock_swarm_observer::{MockSwarmObserver, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::swarm::{InfoHash, MagnetInfo, SwarmEvent, TorrentFile};

    /// A hash made of one repeated byte.
    pub fn info_hash(byte: u8) -> InfoHash {
        InfoHash::from_bytes([byte; 20])
    }

    /// An announce event printed the way libtorrent-style observers print it.
    pub fn announce(hash: &InfoHash, name: &str) -> SwarmEvent {
        SwarmEvent::Announce {
            info_hash: format!("<sha1_hash {}>", hash),
            name: None,
            message: format!(
                "incoming dht announce: {{'info_hash': '{}', 'name': '{}'}}",
                hash, name
            ),
        }
    }

    /// An announce event with no name anywhere.
    pub fn anonymous_announce(hash: &InfoHash) -> SwarmEvent {
        SwarmEvent::Announce {
            info_hash: hash.to_hex(),
            name: None,
            message: format!("incoming dht announce for {}", hash),
        }
    }

    pub fn stats(num_nodes: u64, num_peers: u64) -> SwarmEvent {
        SwarmEvent::DhtStats {
            num_nodes,
            num_peers,
        }
    }

    pub fn log(message: &str) -> SwarmEvent {
        SwarmEvent::Log {
            message: message.to_string(),
        }
    }

    /// Resolved metadata with the given files.
    pub fn magnet_info(name: &str, files: &[(&str, u64)]) -> MagnetInfo {
        MagnetInfo {
            name: Some(name.to_string()),
            files: files
                .iter()
                .map(|(path, size)| TorrentFile::new(*path, *size))
                .collect(),
        }
    }
}
