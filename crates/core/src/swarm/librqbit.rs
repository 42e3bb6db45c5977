//! librqbit-backed swarm observer.
//!
//! Metadata is resolved by adding magnets in list-only mode, so librqbit
//! fetches the info dictionary from peers but never allocates or downloads
//! content. Events come from two places: periodic DHT statistics sampled from
//! the session, and passive LSD announces from the local network.

use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ListOnlyResponse, Session, SessionOptions,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lsd;
use super::{
    FetchHandle, FetchOptions, MagnetInfo, SwarmError, SwarmEvent, SwarmObserver, TorrentFile,
};
use crate::config::{LsdConfig, SessionConfig};

/// Capacity of the pending event queue.
const EVENT_BUFFER_SIZE: usize = 4096;

/// Progress of one list-only add.
#[derive(Debug, Clone)]
enum FetchState {
    Pending,
    Ready(MagnetInfo),
    Failed(String),
}

struct PendingFetch {
    state: FetchState,
    task: Option<JoinHandle<()>>,
}

/// librqbit binds the first free port of an exclusive range.
fn listen_port_range(port: u16) -> Result<Range<u16>, SwarmError> {
    port.checked_add(1)
        .map(|end| port..end)
        .ok_or_else(|| SwarmError::SessionFailed(format!("Listen port {} is out of range", port)))
}

/// Embedded librqbit session used as the swarm observer.
pub struct LibrqbitObserver {
    session: Arc<Session>,
    event_tx: mpsc::Sender<SwarmEvent>,
    event_rx: Mutex<mpsc::Receiver<SwarmEvent>>,
    fetches: Arc<RwLock<HashMap<u64, PendingFetch>>>,
    next_id: AtomicU64,
    background: Vec<JoinHandle<()>>,
}

impl LibrqbitObserver {
    /// Start a librqbit session and the event producers.
    pub async fn new(session_config: &SessionConfig, lsd_config: &LsdConfig) -> Result<Self, SwarmError> {
        let scratch_path = PathBuf::from(&session_config.scratch_path);

        // librqbit wants an output folder even in list-only mode
        if !scratch_path.exists() {
            std::fs::create_dir_all(&scratch_path).map_err(|e| {
                SwarmError::SessionFailed(format!("Failed to create scratch directory: {}", e))
            })?;
        }

        let mut opts = SessionOptions::default();
        if !session_config.enable_dht {
            opts.disable_dht = true;
        }
        if let Some(port) = session_config.listen_port {
            opts.listen_port_range = Some(listen_port_range(port)?);
        }

        info!(
            scratch_path = %scratch_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(scratch_path, opts)
            .await
            .map_err(|e| {
                SwarmError::SessionFailed(format!("Failed to initialize librqbit session: {}", e))
            })?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER_SIZE);

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
            let _ = event_tx.try_send(SwarmEvent::Log {
                message: format!("session listening on TCP port {}", port),
            });
        }

        let mut background = Vec::new();
        background.push(Self::spawn_stats_sampler(
            Arc::clone(&session),
            event_tx.clone(),
            Duration::from_millis(session_config.stats_interval_ms),
        ));

        if lsd_config.enabled {
            match lsd::bind(lsd_config.bind) {
                Ok(socket) => background.push(lsd::spawn_listener(socket, event_tx.clone())),
                Err(e) => {
                    warn!(bind = %lsd_config.bind, error = %e, "LSD listener disabled");
                    let _ = event_tx.try_send(SwarmEvent::Log {
                        message: format!("LSD listener disabled: {}", e),
                    });
                }
            }
        }

        Ok(Self {
            session,
            event_tx,
            event_rx: Mutex::new(event_rx),
            fetches: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            background,
        })
    }

    /// Periodically turn the session's DHT counters into stats events.
    fn spawn_stats_sampler(
        session: Arc<Session>,
        tx: mpsc::Sender<SwarmEvent>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(stats) = session
                    .get_dht()
                    .and_then(|dht| serde_json::to_value(dht.stats()).ok())
                else {
                    continue;
                };

                let read = |key: &str| stats.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
                let event = SwarmEvent::DhtStats {
                    num_nodes: read("routing_table_size"),
                    num_peers: read("outstanding_requests"),
                };

                if tx.try_send(event).is_err() {
                    if tx.is_closed() {
                        break;
                    }
                    debug!("Event queue full, dropping DHT stats");
                }
            }
        })
    }

    fn magnet_info(resp: &ListOnlyResponse) -> Result<MagnetInfo, String> {
        let name = resp
            .info
            .name
            .as_ref()
            .map(|n| String::from_utf8_lossy(n).into_owned());

        let files = resp
            .info
            .iter_file_details()
            .map_err(|e| format!("invalid file list: {:#}", e))?
            .map(|details| TorrentFile {
                path: details
                    .filename
                    .to_string()
                    .unwrap_or_else(|_| "<invalid name>".to_string()),
                size: details.len,
            })
            .collect();

        Ok(MagnetInfo { name, files })
    }

    async fn state_of(&self, handle: &FetchHandle) -> Result<FetchState, SwarmError> {
        self.fetches
            .read()
            .await
            .get(&handle.id)
            .map(|f| f.state.clone())
            .ok_or(SwarmError::HandleNotFound(handle.id))
    }
}

impl Drop for LibrqbitObserver {
    fn drop(&mut self) {
        for task in &self.background {
            task.abort();
        }
        if let Ok(mut fetches) = self.fetches.try_write() {
            for (_, fetch) in fetches.drain() {
                if let Some(task) = fetch.task {
                    task.abort();
                }
            }
        }
    }
}

#[async_trait]
impl SwarmObserver for LibrqbitObserver {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn pop_events(&self) -> Vec<SwarmEvent> {
        let mut rx = self.event_rx.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn begin_metadata_fetch(
        &self,
        magnet_uri: &str,
        options: &FetchOptions,
    ) -> Result<FetchHandle, SwarmError> {
        if !options.metadata_only {
            return Err(SwarmError::Unsupported(
                "content downloads are not supported".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = FetchHandle {
            id,
            magnet_uri: magnet_uri.to_string(),
        };

        // Register before spawning so a fast completion always finds its slot
        let mut fetches = self.fetches.write().await;
        fetches.insert(
            id,
            PendingFetch {
                state: FetchState::Pending,
                task: None,
            },
        );

        let session = Arc::clone(&self.session);
        let slots = Arc::clone(&self.fetches);
        let events = self.event_tx.clone();
        let uri = magnet_uri.to_string();

        let task = tokio::spawn(async move {
            let opts = AddTorrentOptions {
                list_only: true,
                ..Default::default()
            };

            let state = match session
                .add_torrent(AddTorrent::from_url(uri.as_str()), Some(opts))
                .await
            {
                Ok(AddTorrentResponse::ListOnly(resp)) => match Self::magnet_info(&resp) {
                    Ok(info) => FetchState::Ready(info),
                    Err(e) => FetchState::Failed(e),
                },
                Ok(_) => FetchState::Failed("torrent was added instead of listed".to_string()),
                Err(e) => FetchState::Failed(format!("{:#}", e)),
            };

            if let FetchState::Failed(ref reason) = state {
                let _ = events.try_send(SwarmEvent::Log {
                    message: format!("metadata fetch for {} failed: {}", uri, reason),
                });
            }

            if let Some(slot) = slots.write().await.get_mut(&id) {
                slot.state = state;
            }
        });

        if let Some(slot) = fetches.get_mut(&id) {
            slot.task = Some(task);
        }

        debug!(id = id, magnet = %magnet_uri, "Registered metadata fetch");
        Ok(handle)
    }

    async fn has_metadata(&self, handle: &FetchHandle) -> Result<bool, SwarmError> {
        match self.state_of(handle).await? {
            FetchState::Pending => Ok(false),
            FetchState::Ready(_) => Ok(true),
            FetchState::Failed(reason) => Err(SwarmError::FetchFailed(reason)),
        }
    }

    async fn get_info(&self, handle: &FetchHandle) -> Result<MagnetInfo, SwarmError> {
        match self.state_of(handle).await? {
            FetchState::Ready(info) => Ok(info),
            FetchState::Pending => Err(SwarmError::MetadataUnavailable(handle.magnet_uri.clone())),
            FetchState::Failed(reason) => Err(SwarmError::FetchFailed(reason)),
        }
    }

    async fn remove(&self, handle: &FetchHandle) -> Result<(), SwarmError> {
        let fetch = self
            .fetches
            .write()
            .await
            .remove(&handle.id)
            .ok_or(SwarmError::HandleNotFound(handle.id))?;

        // Cancelling the list-only add tears down its peer connections
        if let Some(task) = fetch.task {
            task.abort();
        }

        debug!(id = handle.id, "Metadata fetch removed");
        Ok(())
    }
}
