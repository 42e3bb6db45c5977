//! Mock swarm observer for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::swarm::{
    FetchHandle, FetchOptions, InfoHash, MagnetInfo, SwarmError, SwarmEvent, SwarmObserver,
};

/// A recorded metadata fetch registration for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    /// The handle returned to the caller.
    pub handle: FetchHandle,
    /// The options the fetch was registered with.
    pub options: FetchOptions,
    /// When the fetch was registered.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the SwarmObserver trait.
///
/// Provides controllable behavior for testing:
/// - Script the events returned by `pop_events`
/// - Control when metadata becomes available per hash
/// - Inject registration and polling failures
/// - Track registrations and releases for assertions
///
/// # Example
///
/// ```rust,ignore
/// let observer = MockSwarmObserver::new();
///
/// observer.push_events(vec![fixtures::announce(&hash, "Ubuntu")]).await;
/// observer.set_metadata_ready(&hash, fixtures::magnet_info("Ubuntu", &[])).await;
///
/// // ... run the monitor ...
///
/// assert_eq!(observer.fetch_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockSwarmObserver {
    /// Events waiting to be drained.
    events: Arc<RwLock<VecDeque<SwarmEvent>>>,
    /// Metadata available per magnet URI.
    ready: Arc<RwLock<HashMap<String, MagnetInfo>>>,
    /// Persistent polling failures per magnet URI.
    poll_errors: Arc<RwLock<HashMap<String, String>>>,
    /// Recorded registrations.
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    /// Registrations not yet released, by handle id.
    active: Arc<RwLock<HashMap<u64, FetchHandle>>>,
    /// Released handles.
    removed: Arc<RwLock<Vec<FetchHandle>>>,
    /// If set, the next registration will fail with this error.
    next_error: Arc<RwLock<Option<SwarmError>>>,
    next_id: AtomicU64,
}

impl Default for MockSwarmObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSwarmObserver {
    /// Create a new mock observer with no events and no metadata.
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            ready: Arc::new(RwLock::new(HashMap::new())),
            poll_errors: Arc::new(RwLock::new(HashMap::new())),
            fetches: Arc::new(RwLock::new(Vec::new())),
            active: Arc::new(RwLock::new(HashMap::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue events for the next `pop_events` call.
    pub async fn push_events(&self, events: Vec<SwarmEvent>) {
        self.events.write().await.extend(events);
    }

    /// Number of queued, undrained events.
    pub async fn pending_event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Make metadata for `hash` available, including for fetches already registered.
    pub async fn set_metadata_ready(&self, hash: &InfoHash, info: MagnetInfo) {
        self.ready.write().await.insert(hash.magnet_uri(), info);
    }

    /// Make metadata for `hash` unavailable again.
    pub async fn clear_metadata(&self, hash: &InfoHash) {
        self.ready.write().await.remove(&hash.magnet_uri());
    }

    /// Make every `has_metadata` call for `hash` fail until cleared.
    pub async fn set_poll_error(&self, hash: &InfoHash, message: impl Into<String>) {
        self.poll_errors
            .write()
            .await
            .insert(hash.magnet_uri(), message.into());
    }

    pub async fn clear_poll_error(&self, hash: &InfoHash) {
        self.poll_errors.write().await.remove(&hash.magnet_uri());
    }

    /// Make the next `begin_metadata_fetch` call fail.
    pub async fn set_next_error(&self, error: SwarmError) {
        *self.next_error.write().await = Some(error);
    }

    /// All recorded registrations.
    pub async fn fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Number of registrations made so far.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Number of registrations made for `hash`.
    pub async fn fetch_count_for(&self, hash: &InfoHash) -> usize {
        let magnet_uri = hash.magnet_uri();
        self.fetches
            .read()
            .await
            .iter()
            .filter(|f| f.handle.magnet_uri == magnet_uri)
            .count()
    }

    /// Registrations that have not been released.
    pub async fn active_fetch_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// Handles passed to `remove`, in call order.
    pub async fn removed_handles(&self) -> Vec<FetchHandle> {
        self.removed.read().await.clone()
    }

    async fn check_active(&self, handle: &FetchHandle) -> Result<(), SwarmError> {
        if self.active.read().await.contains_key(&handle.id) {
            Ok(())
        } else {
            Err(SwarmError::HandleNotFound(handle.id))
        }
    }
}

#[async_trait]
impl SwarmObserver for MockSwarmObserver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn pop_events(&self) -> Vec<SwarmEvent> {
        self.events.write().await.drain(..).collect()
    }

    async fn begin_metadata_fetch(
        &self,
        magnet_uri: &str,
        options: &FetchOptions,
    ) -> Result<FetchHandle, SwarmError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let handle = FetchHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            magnet_uri: magnet_uri.to_string(),
        };

        self.fetches.write().await.push(RecordedFetch {
            handle: handle.clone(),
            options: options.clone(),
            timestamp: Utc::now(),
        });
        self.active.write().await.insert(handle.id, handle.clone());

        Ok(handle)
    }

    async fn has_metadata(&self, handle: &FetchHandle) -> Result<bool, SwarmError> {
        self.check_active(handle).await?;
        if let Some(message) = self.poll_errors.read().await.get(&handle.magnet_uri) {
            return Err(SwarmError::FetchFailed(message.clone()));
        }
        Ok(self.ready.read().await.contains_key(&handle.magnet_uri))
    }

    async fn get_info(&self, handle: &FetchHandle) -> Result<MagnetInfo, SwarmError> {
        self.check_active(handle).await?;
        self.ready
            .read()
            .await
            .get(&handle.magnet_uri)
            .cloned()
            .ok_or_else(|| SwarmError::MetadataUnavailable(handle.magnet_uri.clone()))
    }

    async fn remove(&self, handle: &FetchHandle) -> Result<(), SwarmError> {
        self.removed.write().await.push(handle.clone());
        match self.active.write().await.remove(&handle.id) {
            Some(_) => Ok(()),
            None => Err(SwarmError::HandleNotFound(handle.id)),
        }
    }
}
