//! Types for the swarm monitor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while handling a single event.
///
/// These never stop the monitor; they are logged and counted.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Record store error.
    #[error("record store error: {0}")]
    Store(#[from] crate::record::RecordError),
}

/// Current status of the monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Whether the event loop is running.
    pub running: bool,
    /// Raw events drained from the observer.
    pub events_seen: u64,
    /// Classified hash announces.
    pub announces: u64,
    /// Resolutions dispatched.
    pub resolutions_started: u64,
    pub resolutions_succeeded: u64,
    pub resolutions_timed_out: u64,
    pub resolutions_failed: u64,
    /// Announces for hashes already resolved successfully.
    pub skipped: u64,
    /// Announces for hashes with a resolution already in flight.
    pub resighted_in_flight: u64,
    /// Store operations that failed.
    pub store_failures: u64,
    /// Store failures since the last successful store operation.
    pub consecutive_store_failures: u32,
    /// Resolutions currently in flight.
    pub in_flight: usize,
}

impl MonitorStatus {
    /// Resolutions that reached a terminal state and were recorded.
    pub fn resolutions_finished(&self) -> u64 {
        self.resolutions_succeeded + self.resolutions_timed_out + self.resolutions_failed
    }
}
