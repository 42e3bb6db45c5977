//! Discovery-to-resolution pipeline integration tests.
//!
//! These tests drive the monitor end to end with a mock observer, an on-disk
//! SQLite store and a real outcome log file:
//! - Timed out hashes are retried on a later sighting
//! - Resolved hashes are never resolved again, but sightings are recorded
//! - Each wait is bounded by the metadata deadline
//! - Malformed announces degrade to the "Unknown" name
//! - Store failures never stop the loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use swarmwatch_core::{
    create_outcome_log, FileOutcomeSink, MetadataResolver, MonitorConfig, RecordStore,
    ResolutionStatus, ResolverConfig, SqliteRecordStore, SwarmError, SwarmEvent, SwarmMonitor,
    UpsertRecord, UNKNOWN_NAME,
    testing::{fixtures, FailingRecordStore, MockSwarmObserver},
};

const UBUNTU: &str = "Ubuntu 24.04 Desktop";

/// Test helper wiring the full pipeline against temp files.
struct TestHarness {
    monitor: SwarmMonitor,
    observer: Arc<MockSwarmObserver>,
    store: Arc<FailingRecordStore>,
    writer: JoinHandle<()>,
    log_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(MonitorConfig {
            event_poll_interval_ms: 100,
            metadata_timeout_ms: 5_000,
            metadata_poll_interval_ms: 1_000,
            ..Default::default()
        })
    }

    fn with_config(config: MonitorConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log_path = temp_dir.path().join("outcomes.txt");

        let sqlite = SqliteRecordStore::new(&temp_dir.path().join("monitor.db"))
            .expect("Failed to create record store");
        let store = Arc::new(FailingRecordStore::new(Arc::new(sqlite)));
        let observer = Arc::new(MockSwarmObserver::new());

        let sink = Arc::new(FileOutcomeSink::open(&log_path).expect("Failed to open log"));
        let (outcomes, writer) = create_outcome_log(sink, 64);
        let writer = tokio::spawn(writer.run());

        let resolver = MetadataResolver::new(
            observer.clone(),
            store.clone(),
            outcomes,
            ResolverConfig::from(&config),
        );
        let monitor = SwarmMonitor::new(config, observer.clone(), store.clone(), resolver);

        Self {
            monitor,
            observer,
            store,
            writer,
            log_path,
            _temp_dir: temp_dir,
        }
    }

    /// Deliver events and handle them as one loop tick would, then let every
    /// dispatched resolution finish.
    async fn sighting(&self, events: Vec<SwarmEvent>) {
        self.observer.push_events(events).await;
        self.monitor.process_events().await;
        self.monitor.wait_idle().await;
    }

    /// Shut the pipeline down and return the outcome log contents.
    async fn finish(self) -> String {
        drop(self.monitor);
        self.writer.await.expect("Outcome writer panicked");
        std::fs::read_to_string(&self.log_path).expect("Failed to read outcome log")
    }
}

fn status_lines(log: &str) -> Vec<&str> {
    log.lines().filter(|l| l.starts_with("Status: ")).collect()
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_success_then_skip() {
    let h = TestHarness::new();
    let hash = fixtures::info_hash(0xAB);

    // First sighting: no metadata within the deadline.
    h.sighting(vec![fixtures::announce(&hash, UBUNTU)]).await;

    let first = h.store.lookup(&hash).unwrap().unwrap();
    assert_eq!(first.status, ResolutionStatus::TimedOut);
    assert_eq!(first.name, UBUNTU);
    assert!(first.files.is_empty());
    assert_eq!(first.first_seen, first.last_seen);

    // Second sighting: metadata is now available.
    h.observer
        .set_metadata_ready(
            &hash,
            fixtures::magnet_info(
                UBUNTU,
                &[("ubuntu-24.04-desktop-amd64.iso", 6_114_656_256), ("SHA256SUMS", 202)],
            ),
        )
        .await;
    h.sighting(vec![fixtures::announce(&hash, UBUNTU)]).await;

    let second = h.store.lookup(&hash).unwrap().unwrap();
    assert_eq!(second.status, ResolutionStatus::Success);
    assert_eq!(second.files.len(), 2);
    assert_eq!(second.files[0].path, "ubuntu-24.04-desktop-amd64.iso");
    assert_eq!(second.first_seen, first.first_seen);
    assert!(second.last_seen >= first.last_seen);
    assert_eq!(second.seen_count, 2);

    // Third sighting: skipped, resolver not invoked.
    h.sighting(vec![fixtures::announce(&hash, UBUNTU)]).await;

    let third = h.store.lookup(&hash).unwrap().unwrap();
    assert_eq!(third.status, ResolutionStatus::Success);
    assert_eq!(third.files, second.files);
    assert_eq!(third.first_seen, first.first_seen);
    assert!(third.last_seen >= second.last_seen);
    assert_eq!(third.seen_count, 3);

    assert_eq!(h.observer.fetch_count_for(&hash).await, 2);
    let status = h.monitor.status();
    assert_eq!(status.resolutions_started, 2);
    assert_eq!(status.resolutions_timed_out, 1);
    assert_eq!(status.resolutions_succeeded, 1);
    assert_eq!(status.skipped, 1);

    let log = h.finish().await;
    assert_eq!(status_lines(&log), vec!["Status: Timed Out", "Status: Success"]);
    assert!(log.contains(&format!("Torrent Hash: {}\n", hash)));
    assert!(log.contains(" - ubuntu-24.04-desktop-amd64.iso (6114656256 bytes)\n"));
    assert!(log.contains(" - No files available\n"));
    assert!(log.contains(&format!("Magnet Link: magnet:?xt=urn:btih:{}\n", hash)));
}

#[tokio::test(start_paused = true)]
async fn test_error_is_retried_on_next_sighting() {
    let h = TestHarness::new();
    let hash = fixtures::info_hash(0x31);

    h.observer
        .set_next_error(SwarmError::FetchFailed("invalid magnet".to_string()))
        .await;
    h.sighting(vec![fixtures::announce(&hash, "Retry Me")]).await;

    let failed = h.store.lookup(&hash).unwrap().unwrap();
    assert_eq!(failed.status, ResolutionStatus::Error);
    assert!(failed.last_error.as_deref().unwrap().contains("invalid magnet"));

    h.observer
        .set_metadata_ready(&hash, fixtures::magnet_info("Retry Me", &[("data.bin", 42)]))
        .await;
    h.sighting(vec![fixtures::announce(&hash, "Retry Me")]).await;

    let resolved = h.store.lookup(&hash).unwrap().unwrap();
    assert_eq!(resolved.status, ResolutionStatus::Success);
    assert_eq!(resolved.last_error, None);
    assert_eq!(resolved.first_seen, failed.first_seen);

    let log = h.finish().await;
    let statuses = status_lines(&log);
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].starts_with("Status: Error: "));
    assert_eq!(statuses[1], "Status: Success");
}

#[tokio::test(start_paused = true)]
async fn test_wait_is_bounded_by_deadline() {
    let h = TestHarness::with_config(MonitorConfig {
        metadata_timeout_ms: 2_000,
        metadata_poll_interval_ms: 750,
        ..Default::default()
    });
    let hash = fixtures::info_hash(0x41);

    let started = tokio::time::Instant::now();
    h.sighting(vec![fixtures::anonymous_announce(&hash)]).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(2_000));
    assert!(elapsed <= Duration::from_millis(2_750));
    assert_eq!(h.monitor.status().resolutions_timed_out, 1);
    // Released on timeout by default.
    assert_eq!(h.observer.active_fetch_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_announces_degrade_to_unknown() {
    let h = TestHarness::new();
    let anonymous = fixtures::info_hash(0x51);
    let garbled = fixtures::info_hash(0x52);

    h.observer.set_metadata_ready(&anonymous, Default::default()).await;
    h.sighting(vec![
        fixtures::anonymous_announce(&anonymous),
        SwarmEvent::Announce {
            info_hash: garbled.to_hex().to_uppercase(),
            name: None,
            message: "{'name': 'unterminated".to_string(),
        },
        SwarmEvent::Announce {
            info_hash: "<sha1_hash zz>".to_string(),
            name: None,
            message: "{'name': 'Dropped'}".to_string(),
        },
        fixtures::stats(200, 3),
    ])
    .await;

    let anonymous_record = h.store.lookup(&anonymous).unwrap().unwrap();
    assert_eq!(anonymous_record.status, ResolutionStatus::Success);
    assert_eq!(anonymous_record.name, UNKNOWN_NAME);

    let garbled_record = h.store.lookup(&garbled).unwrap().unwrap();
    assert_eq!(garbled_record.status, ResolutionStatus::TimedOut);
    assert_eq!(garbled_record.name, UNKNOWN_NAME);

    let status = h.monitor.status();
    assert_eq!(status.events_seen, 4);
    assert_eq!(status.announces, 2);

    let log = h.finish().await;
    assert_eq!(log.matches("Torrent Name: Unknown\n").count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_store_outage() {
    let h = TestHarness::with_config(MonitorConfig {
        event_poll_interval_ms: 100,
        metadata_timeout_ms: 1_000,
        metadata_poll_interval_ms: 500,
        store_failure_alert_threshold: 2,
        ..Default::default()
    });
    let during = fixtures::info_hash(0x61);
    let after = fixtures::info_hash(0x62);
    h.observer
        .set_metadata_ready(&after, fixtures::magnet_info("After", &[("a", 1)]))
        .await;

    h.monitor.start();
    h.store.set_failing(true);
    for _ in 0..3 {
        h.observer.push_events(vec![fixtures::announce(&during, "During")]).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    assert!(h.monitor.is_running());
    assert!(h.monitor.status().store_failures >= 3);
    assert!(h.store.failure_count() >= 3);

    h.store.set_failing(false);
    h.observer.push_events(vec![fixtures::announce(&after, "After")]).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.monitor.wait_idle().await;

    let record = h.store.lookup(&after).unwrap().unwrap();
    assert_eq!(record.status, ResolutionStatus::Success);
    assert!(h.store.lookup(&during).unwrap().is_none());
    assert_eq!(h.monitor.status().consecutive_store_failures, 0);

    h.monitor.stop().await;
    assert!(!h.monitor.is_running());
}

#[test]
fn test_records_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("monitor.db");
    let hash = fixtures::info_hash(0x71);

    {
        let store = SqliteRecordStore::new(&db_path).unwrap();
        store
            .upsert(
                &UpsertRecord::status_only(hash, ResolutionStatus::Success)
                    .with_name("Persisted"),
            )
            .unwrap();
    }

    let store = SqliteRecordStore::new(&db_path).unwrap();
    let record = store.lookup(&hash).unwrap().unwrap();
    assert_eq!(record.name, "Persisted");
    assert_eq!(store.count_by_status().unwrap().success, 1);
}
