//! Metadata resolver implementation.
//!
//! One call to [`MetadataResolver::resolve`] walks a single hash through
//! `Idle -> AwaitingMetadata -> {Resolved, TimedOut, Failed}` and records the
//! terminal state once in the outcome log and once in the record store.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::outcome::{OutcomeEntry, OutcomeHandle};
use crate::record::{RecordStore, UpsertRecord, UNKNOWN_NAME};
use crate::swarm::{FetchHandle, FetchOptions, InfoHash, MagnetInfo, SwarmObserver};

use super::types::{Resolution, ResolutionOutcome, ResolutionState, ResolveError, ResolverConfig};

/// What the observer gave us before the resolution ended.
enum Attempt {
    Resolved(MagnetInfo),
    TimedOut,
    Failed(String),
}

/// Resolves announced hashes into torrent metadata.
#[derive(Clone)]
pub struct MetadataResolver {
    observer: Arc<dyn SwarmObserver>,
    store: Arc<dyn RecordStore>,
    outcomes: OutcomeHandle,
    config: ResolverConfig,
}

impl MetadataResolver {
    pub fn new(
        observer: Arc<dyn SwarmObserver>,
        store: Arc<dyn RecordStore>,
        outcomes: OutcomeHandle,
        config: ResolverConfig,
    ) -> Self {
        Self {
            observer,
            store,
            outcomes,
            config,
        }
    }

    /// Resolve one hash.
    ///
    /// `best_effort_name` is the name parsed from the announce; it is used
    /// when the metadata carries no name of its own. Observer failures end in
    /// `ResolutionOutcome::Failed`; only a store failure returns `Err`, after
    /// the outcome log entry has been queued.
    pub async fn resolve(
        &self,
        hash: InfoHash,
        best_effort_name: &str,
    ) -> Result<Resolution, ResolveError> {
        let magnet_uri = hash.magnet_uri();
        let hint = known_name(best_effort_name);
        let started = Instant::now();

        debug!(hash = %hash, state = ?ResolutionState::Idle, "Resolving metadata");

        let (outcome, name, files) = match self.attempt(&hash, &magnet_uri).await {
            Attempt::Resolved(info) => {
                let name = info.name.as_deref().and_then(known_name).or(hint);
                (ResolutionOutcome::Resolved, name, info.files)
            }
            Attempt::TimedOut => (ResolutionOutcome::TimedOut, hint, Vec::new()),
            Attempt::Failed(message) => (ResolutionOutcome::Failed(message), hint, Vec::new()),
        };
        let elapsed = started.elapsed();

        match &outcome {
            ResolutionOutcome::Resolved => info!(
                hash = %hash,
                name = name.as_deref().unwrap_or(UNKNOWN_NAME),
                files = files.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Metadata resolved"
            ),
            ResolutionOutcome::TimedOut => info!(
                hash = %hash,
                elapsed_ms = elapsed.as_millis() as u64,
                "Metadata fetch timed out"
            ),
            ResolutionOutcome::Failed(message) => {
                warn!(hash = %hash, error = %message, "Metadata fetch failed")
            }
        }

        let status = outcome.outcome_status();
        self.outcomes
            .record(
                OutcomeEntry::new(hash, status.clone())
                    .with_name(name.clone())
                    .with_files(files.clone()),
            )
            .await;

        let mut update =
            UpsertRecord::status_only(hash, status.resolution_status()).with_magnet_uri(magnet_uri);
        if let Some(name) = &name {
            update = update.with_name(name.clone());
        }
        match &outcome {
            ResolutionOutcome::Resolved => update = update.with_files(files.clone()),
            ResolutionOutcome::Failed(message) => update = update.with_error(message.clone()),
            ResolutionOutcome::TimedOut => {}
        }
        let record = self.store.upsert(&update)?;

        Ok(Resolution {
            hash,
            outcome,
            name,
            files,
            elapsed,
            record,
        })
    }

    async fn attempt(&self, hash: &InfoHash, magnet_uri: &str) -> Attempt {
        let handle = match self
            .observer
            .begin_metadata_fetch(magnet_uri, &FetchOptions::default())
            .await
        {
            Ok(handle) => handle,
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        debug!(hash = %hash, handle = handle.id, state = ?ResolutionState::AwaitingMetadata, "Fetch registered");

        let attempt = self.await_metadata(&handle).await;

        match attempt {
            Attempt::TimedOut if !self.config.release_on_timeout => {
                debug!(hash = %hash, handle = handle.id, "Leaving timed-out fetch registered");
            }
            _ => self.release(hash, &handle).await,
        }

        attempt
    }

    /// Poll until metadata shows up or the deadline (measured from
    /// registration) passes.
    async fn await_metadata(&self, handle: &FetchHandle) -> Attempt {
        let deadline = Instant::now() + self.config.metadata_timeout;

        loop {
            match self.observer.has_metadata(handle).await {
                Ok(true) => {
                    return match self.observer.get_info(handle).await {
                        Ok(info) => Attempt::Resolved(info),
                        Err(e) => Attempt::Failed(e.to_string()),
                    };
                }
                Ok(false) => {}
                Err(e) => return Attempt::Failed(e.to_string()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Attempt::TimedOut;
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn release(&self, hash: &InfoHash, handle: &FetchHandle) {
        if let Err(e) = self.observer.remove(handle).await {
            warn!(hash = %hash, handle = handle.id, "Failed to release fetch: {}", e);
        }
    }
}

/// A usable name, or `None` for blanks and the sentinel.
fn known_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name == UNKNOWN_NAME {
        None
    } else {
        Some(name.to_string())
    }
}
