use std::fmt;

use chrono::{DateTime, Utc};

use crate::record::{ResolutionStatus, UNKNOWN_NAME};
use crate::swarm::{InfoHash, TorrentFile};

const RULE_WIDTH: usize = 50;

/// Terminal outcome as written to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    TimedOut,
    Error(String),
}

impl OutcomeStatus {
    /// The status persisted in the record store for this outcome.
    pub fn resolution_status(&self) -> ResolutionStatus {
        match self {
            OutcomeStatus::Success => ResolutionStatus::Success,
            OutcomeStatus::TimedOut => ResolutionStatus::TimedOut,
            OutcomeStatus::Error(_) => ResolutionStatus::Error,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => f.write_str("Success"),
            OutcomeStatus::TimedOut => f.write_str("Timed Out"),
            OutcomeStatus::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// One terminal resolution outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeEntry {
    pub timestamp: DateTime<Utc>,
    pub hash: InfoHash,
    pub name: Option<String>,
    pub files: Vec<TorrentFile>,
    pub magnet_uri: String,
    pub status: OutcomeStatus,
}

impl OutcomeEntry {
    pub fn new(hash: InfoHash, status: OutcomeStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            hash,
            name: None,
            files: Vec::new(),
            magnet_uri: hash.magnet_uri(),
            status,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_files(mut self, files: Vec<TorrentFile>) -> Self {
        self.files = files;
        self
    }

    /// Render the text block appended to the log file.
    pub fn render(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NAME);

        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!("Torrent Hash: {}\n", self.hash));
        out.push_str(&format!("Torrent Name: {}\n", name));
        out.push_str("Files:\n");
        if self.files.is_empty() {
            out.push_str(" - No files available\n");
        } else {
            for file in &self.files {
                out.push_str(&format!(" - {} ({} bytes)\n", file.path, file.size));
            }
        }
        out.push_str(&format!("Magnet Link: {}\n", self.magnet_uri));
        out.push_str(&format!("Status: {}\n", self.status));
        out.push_str(&rule);
        out.push('\n');
        out
    }
}
