use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarmwatch_core::{
    create_outcome_log, load_config, validate_config, FileOutcomeSink, LibrqbitObserver,
    MetadataResolver, OutcomeSink, RecordStore, ResolverConfig, SqliteRecordStore, SwarmMonitor,
    SwarmObserver,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,librqbit=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SWARMWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    info!(version = VERSION, config_hash = config_hash_short, "Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Outcome log path: {:?}", config.outcome_log.path);

    // Create SQLite record store
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteRecordStore::new(&config.database.path).context("Failed to open record store")?,
    );
    match store.count_by_status() {
        Ok(counts) => info!(
            total = counts.total(),
            success = counts.success,
            timed_out = counts.timed_out,
            error = counts.error,
            "Record store initialized"
        ),
        Err(e) => warn!("Record store opened but could not be counted: {}", e),
    }

    // Create outcome log
    let sink: Arc<dyn OutcomeSink> = Arc::new(
        FileOutcomeSink::open(&config.outcome_log.path).context("Failed to open outcome log")?,
    );
    let (outcome_handle, outcome_writer) = create_outcome_log(sink, config.outcome_log.buffer_size);

    // Spawn outcome writer task
    let writer_handle = tokio::spawn(outcome_writer.run());

    // Create the embedded BitTorrent session
    info!(
        "Initializing embedded librqbit session (scratch path: {})",
        config.session.scratch_path
    );
    let observer: Arc<dyn SwarmObserver> = Arc::new(
        LibrqbitObserver::new(&config.session, &config.lsd)
            .await
            .context("Failed to start BitTorrent session")?,
    );

    let resolver = MetadataResolver::new(
        Arc::clone(&observer),
        Arc::clone(&store),
        outcome_handle.clone(),
        ResolverConfig::from(&config.monitor),
    );

    let monitor = SwarmMonitor::new(
        config.monitor.clone(),
        Arc::clone(&observer),
        Arc::clone(&store),
        resolver,
    );
    monitor.start();
    info!("Swarm monitor running, press Ctrl+C to stop");

    shutdown_signal().await;

    info!("Shutting down...");
    monitor.stop().await;

    let status = monitor.status();
    info!(
        events = status.events_seen,
        announces = status.announces,
        resolved = status.resolutions_succeeded,
        timed_out = status.resolutions_timed_out,
        failed = status.resolutions_failed,
        skipped = status.skipped,
        store_failures = status.store_failures,
        "Final monitor status"
    );

    // Drop all holders of OutcomeHandle so the writer's channel closes.
    // The monitor owns the resolver, which holds a clone.
    drop(monitor);
    drop(outcome_handle);

    // Wait for writer to flush remaining entries
    let _ = writer_handle.await;
    info!("Outcome writer stopped");

    drop(observer);
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
