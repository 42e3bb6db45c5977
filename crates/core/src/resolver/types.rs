//! Types for the metadata resolver.

use std::time::Duration;

use thiserror::Error;

use crate::monitor::MonitorConfig;
use crate::outcome::OutcomeStatus;
use crate::record::{RecordError, TorrentRecord};
use crate::swarm::{InfoHash, TorrentFile};

/// Errors that abort a resolution.
///
/// Observer failures are not errors here: they end the resolution in the
/// `Failed` state and are recorded like any other outcome.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("record store error: {0}")]
    Store(#[from] RecordError),
}

/// Lifecycle of a single resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    AwaitingMetadata,
    Resolved,
    TimedOut,
    Failed,
}

impl ResolutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolutionState::Resolved | ResolutionState::TimedOut | ResolutionState::Failed
        )
    }
}

/// Terminal result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved,
    TimedOut,
    /// The observer reported an error; carries its description.
    Failed(String),
}

impl ResolutionOutcome {
    pub fn state(&self) -> ResolutionState {
        match self {
            ResolutionOutcome::Resolved => ResolutionState::Resolved,
            ResolutionOutcome::TimedOut => ResolutionState::TimedOut,
            ResolutionOutcome::Failed(_) => ResolutionState::Failed,
        }
    }

    /// How this outcome is written to the outcome log.
    pub fn outcome_status(&self) -> OutcomeStatus {
        match self {
            ResolutionOutcome::Resolved => OutcomeStatus::Success,
            ResolutionOutcome::TimedOut => OutcomeStatus::TimedOut,
            ResolutionOutcome::Failed(message) => OutcomeStatus::Error(message.clone()),
        }
    }
}

/// A finished resolution and the record it produced.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub hash: InfoHash,
    pub outcome: ResolutionOutcome,
    /// Name written with the outcome. `None` when nothing better than the
    /// sentinel was known.
    pub name: Option<String>,
    /// Files in observer order. Empty unless resolved.
    pub files: Vec<TorrentFile>,
    /// Time from registration to the terminal state.
    pub elapsed: Duration,
    /// The record as stored after the upsert.
    pub record: TorrentRecord,
}

/// Timing and cleanup policy for resolutions.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub metadata_timeout: Duration,
    pub poll_interval: Duration,
    pub release_on_timeout: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for ResolverConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            metadata_timeout: Duration::from_millis(config.metadata_timeout_ms),
            poll_interval: Duration::from_millis(config.metadata_poll_interval_ms),
            release_on_timeout: config.release_on_timeout,
        }
    }
}
