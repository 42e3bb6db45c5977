//! Monitor configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the swarm monitor and the metadata resolutions it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often to drain observer events (milliseconds).
    #[serde(default = "default_event_interval")]
    pub event_poll_interval_ms: u64,

    /// Deadline for a single metadata fetch (milliseconds).
    /// Fetches still pending after this are recorded as timed out.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_ms: u64,

    /// How often a resolution checks its fetch for metadata (milliseconds).
    #[serde(default = "default_metadata_poll")]
    pub metadata_poll_interval_ms: u64,

    /// Maximum concurrent resolutions (0 = unlimited).
    /// Announces arriving while the limit is reached wait for a free slot.
    #[serde(default)]
    pub max_concurrent_resolutions: usize,

    /// Release the observer registration when a fetch times out.
    /// When false, timed-out fetches keep running inside the observer.
    #[serde(default = "default_true")]
    pub release_on_timeout: bool,

    /// Consecutive store failures before the monitor escalates to error logs.
    #[serde(default = "default_alert_threshold")]
    pub store_failure_alert_threshold: u32,
}

fn default_event_interval() -> u64 {
    5000 // 5 seconds
}

fn default_metadata_timeout() -> u64 {
    60_000 // 1 minute
}

fn default_metadata_poll() -> u64 {
    1000 // 1 second
}

fn default_true() -> bool {
    true
}

fn default_alert_threshold() -> u32 {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: default_event_interval(),
            metadata_timeout_ms: default_metadata_timeout(),
            metadata_poll_interval_ms: default_metadata_poll(),
            max_concurrent_resolutions: 0,
            release_on_timeout: true,
            store_failure_alert_threshold: default_alert_threshold(),
        }
    }
}
