use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::swarm::{InfoHash, TorrentFile};

/// Name stored when nothing better is known.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt record {hash}: {reason}")]
    Corrupt { hash: String, reason: String },
}

/// Last known resolution outcome of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Success,
    TimedOut,
    Error,
}

impl ResolutionStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Success => "Success",
            ResolutionStatus::TimedOut => "TimedOut",
            ResolutionStatus::Error => "Error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Success" => Some(ResolutionStatus::Success),
            "TimedOut" => Some(ResolutionStatus::TimedOut),
            "Error" => Some(ResolutionStatus::Error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionStatus::Success)
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per distinct info hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentRecord {
    pub hash: InfoHash,
    pub name: String,
    /// Files in resolution order; empty if never resolved.
    pub files: Vec<TorrentFile>,
    pub magnet_uri: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: ResolutionStatus,
    /// Number of sightings recorded.
    pub seen_count: u64,
    /// Description of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

/// Values written by an upsert. `None` keeps whatever is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRecord {
    pub hash: InfoHash,
    pub name: Option<String>,
    pub files: Option<Vec<TorrentFile>>,
    pub magnet_uri: Option<String>,
    pub status: ResolutionStatus,
    pub error: Option<String>,
}

impl UpsertRecord {
    /// An upsert carrying only a status.
    pub fn status_only(hash: InfoHash, status: ResolutionStatus) -> Self {
        Self {
            hash,
            name: None,
            files: None,
            magnet_uri: None,
            status,
            error: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_files(mut self, files: Vec<TorrentFile>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_magnet_uri(mut self, magnet_uri: impl Into<String>) -> Self {
        self.magnet_uri = Some(magnet_uri.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Number of records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub success: u64,
    pub timed_out: u64,
    pub error: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.success + self.timed_out + self.error
    }
}

/// Durable mapping from info hash to torrent record.
pub trait RecordStore: Send + Sync {
    /// Fetch the record for a hash.
    fn lookup(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError>;

    /// Insert the record if absent, otherwise merge into it. Returns the stored record.
    ///
    /// A stored `Success` is never replaced by a non-success outcome: only
    /// `last_seen` and `seen_count` move in that case.
    fn upsert(&self, record: &UpsertRecord) -> Result<TorrentRecord, RecordError>;

    /// Record a sighting without touching status or metadata.
    /// Returns `None` if the hash has no record yet.
    fn touch(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError>;

    /// Count records per status.
    fn count_by_status(&self) -> Result<StatusCounts, RecordError>;
}
