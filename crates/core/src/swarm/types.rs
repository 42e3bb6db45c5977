//! Types for the swarm observer collaborator.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the swarm observer.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Session failed: {0}")]
    SessionFailed(String),

    #[error("Metadata fetch failed: {0}")]
    FetchFailed(String),

    #[error("Fetch handle not found: {0}")]
    HandleNotFound(u64),

    #[error("Metadata not available yet: {0}")]
    MetadataUnavailable(String),

    #[error("Invalid info hash: {0}")]
    InvalidInfoHash(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// A 20-byte BitTorrent v1 info hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex representation (40 chars).
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(40);
        for byte in self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }

    /// Magnet URI for this hash (`magnet:?xt=urn:btih:<hex>`).
    pub fn magnet_uri(&self) -> String {
        format!("magnet:?xt=urn:btih:{}", self.to_hex())
    }

    /// Leniently parse a hash as printed by an observer.
    ///
    /// Accepts 40 hex characters in either case, optionally wrapped as
    /// `<sha1_hash ...>` and surrounded by whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix("<sha1_hash")
            .map(|rest| rest.trim_end_matches('>').trim())
            .unwrap_or(trimmed);

        let bytes = trimmed.as_bytes();
        if bytes.len() != 40 {
            return None;
        }

        let mut out = [0u8; 20];
        for (idx, chunk) in bytes.chunks_exact(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)? as u8;
            let lo = (chunk[1] as char).to_digit(16)? as u8;
            out[idx] = (hi << 4) | lo;
        }
        Some(Self(out))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SwarmError::InvalidInfoHash(s.to_string()))
    }
}

impl TryFrom<String> for InfoHash {
    type Error = SwarmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InfoHash> for String {
    fn from(hash: InfoHash) -> Self {
        hash.to_hex()
    }
}

/// A raw event as reported by the swarm observer, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum SwarmEvent {
    /// Some peer announced interest in an info hash.
    Announce {
        /// The hash exactly as the observer printed it.
        info_hash: String,
        /// Structured display name, when the observer exposes one.
        name: Option<String>,
        /// Human readable message accompanying the announce.
        message: String,
    },
    /// Periodic DHT statistics.
    DhtStats { num_nodes: u64, num_peers: u64 },
    /// Free-form diagnostic line.
    Log { message: String },
    /// Anything else the observer emits.
    Other { kind: String, message: String },
}

impl SwarmEvent {
    /// Short event kind used in logs.
    pub fn kind(&self) -> &str {
        match self {
            SwarmEvent::Announce { .. } => "announce",
            SwarmEvent::DhtStats { .. } => "dht_stats",
            SwarmEvent::Log { .. } => "log",
            SwarmEvent::Other { kind, .. } => kind,
        }
    }
}

/// Options for registering a metadata fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Only resolve metadata; never download content.
    pub metadata_only: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            metadata_only: true,
        }
    }
}

/// Handle for a registered metadata fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchHandle {
    pub id: u64,
    pub magnet_uri: String,
}

/// A single file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent root.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

impl TorrentFile {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Metadata resolved for a magnet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MagnetInfo {
    /// Canonical torrent name, if the metadata carries one.
    pub name: Option<String>,
    /// Files in the order the observer returned them.
    pub files: Vec<TorrentFile>,
}

/// Abstraction over the BitTorrent engine the monitor observes.
#[async_trait]
pub trait SwarmObserver: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Drain events produced since the last call. May be empty.
    async fn pop_events(&self) -> Vec<SwarmEvent>;

    /// Register interest in a magnet's metadata.
    async fn begin_metadata_fetch(
        &self,
        magnet_uri: &str,
        options: &FetchOptions,
    ) -> Result<FetchHandle, SwarmError>;

    /// Whether metadata for the handle is available.
    async fn has_metadata(&self, handle: &FetchHandle) -> Result<bool, SwarmError>;

    /// Resolved metadata for the handle.
    async fn get_info(&self, handle: &FetchHandle) -> Result<MagnetInfo, SwarmError>;

    /// Release the registration and any engine-side resources.
    async fn remove(&self, handle: &FetchHandle) -> Result<(), SwarmError>;
}
