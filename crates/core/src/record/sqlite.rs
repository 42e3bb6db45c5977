//! SQLite-backed record store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    RecordError, RecordStore, ResolutionStatus, StatusCounts, TorrentRecord, UpsertRecord,
    UNKNOWN_NAME,
};
use crate::swarm::{InfoHash, TorrentFile};

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

/// Column values as read from the database, before validation.
struct RawRow {
    hash: String,
    name: String,
    files: String,
    magnet_uri: String,
    first_seen: String,
    last_seen: String,
    status: String,
    seen_count: i64,
    last_error: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT torrent_hash, torrent_name, files, magnet_link, first_seen, \
     last_seen, status, seen_count, last_error FROM torrents";

impl SqliteRecordStore {
    /// Open (or create) the database file and its schema.
    pub fn new(path: &Path) -> Result<Self, RecordError> {
        let conn = Connection::open(path).map_err(|e| RecordError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, RecordError> {
        let conn = Connection::open_in_memory().map_err(|e| RecordError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RecordError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS torrents (
                torrent_hash TEXT PRIMARY KEY,
                torrent_name TEXT NOT NULL,
                files TEXT NOT NULL DEFAULT '[]',
                magnet_link TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                status TEXT NOT NULL,
                seen_count INTEGER NOT NULL DEFAULT 1,
                last_error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_torrents_status ON torrents(status);
            CREATE INDEX IF NOT EXISTS idx_torrents_last_seen ON torrents(last_seen);
            "#,
        )
        .map_err(|e| RecordError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RecordError> {
        self.conn
            .lock()
            .map_err(|_| RecordError::Database("connection lock poisoned".to_string()))
    }

    /// Current time at the precision the database keeps.
    fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }

    fn format_time(time: &DateTime<Utc>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_time(hash: &str, value: &str) -> Result<DateTime<Utc>, RecordError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RecordError::Corrupt {
                hash: hash.to_string(),
                reason: format!("invalid timestamp {:?}: {}", value, e),
            })
    }

    fn read_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            hash: row.get(0)?,
            name: row.get(1)?,
            files: row.get(2)?,
            magnet_uri: row.get(3)?,
            first_seen: row.get(4)?,
            last_seen: row.get(5)?,
            status: row.get(6)?,
            seen_count: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn into_record(raw: RawRow) -> Result<TorrentRecord, RecordError> {
        let corrupt = |reason: String| RecordError::Corrupt {
            hash: raw.hash.clone(),
            reason,
        };

        let hash = InfoHash::parse(&raw.hash).ok_or_else(|| corrupt("invalid hash".to_string()))?;
        let status = ResolutionStatus::parse(&raw.status)
            .ok_or_else(|| corrupt(format!("unknown status {:?}", raw.status)))?;
        let files: Vec<TorrentFile> = serde_json::from_str(&raw.files)
            .map_err(|e| corrupt(format!("invalid file list: {}", e)))?;

        Ok(TorrentRecord {
            hash,
            name: raw.name.clone(),
            files,
            magnet_uri: raw.magnet_uri.clone(),
            first_seen: Self::parse_time(&raw.hash, &raw.first_seen)?,
            last_seen: Self::parse_time(&raw.hash, &raw.last_seen)?,
            status,
            seen_count: raw.seen_count.max(0) as u64,
            last_error: raw.last_error.clone(),
        })
    }

    fn lookup_in(conn: &Connection, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError> {
        let raw = conn
            .query_row(
                &format!("{} WHERE torrent_hash = ?", SELECT_COLUMNS),
                params![hash.to_hex()],
                Self::read_row,
            )
            .optional()
            .map_err(|e| RecordError::Database(e.to_string()))?;

        raw.map(Self::into_record).transpose()
    }

    fn write(conn: &Connection, record: &TorrentRecord) -> Result<(), RecordError> {
        let files = serde_json::to_string(&record.files)
            .map_err(|e| RecordError::Serialization(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO torrents
                (torrent_hash, torrent_name, files, magnet_link, first_seen, last_seen, status, seen_count, last_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(torrent_hash) DO UPDATE SET
                torrent_name = excluded.torrent_name,
                files = excluded.files,
                magnet_link = excluded.magnet_link,
                last_seen = excluded.last_seen,
                status = excluded.status,
                seen_count = excluded.seen_count,
                last_error = excluded.last_error
            "#,
            params![
                record.hash.to_hex(),
                record.name,
                files,
                record.magnet_uri,
                Self::format_time(&record.first_seen),
                Self::format_time(&record.last_seen),
                record.status.as_str(),
                record.seen_count as i64,
                record.last_error,
            ],
        )
        .map_err(|e| RecordError::Database(e.to_string()))?;

        Ok(())
    }
}

/// Apply an upsert to the currently stored record (if any).
pub(crate) fn merge(
    existing: Option<TorrentRecord>,
    update: &UpsertRecord,
    now: DateTime<Utc>,
) -> TorrentRecord {
    let Some(mut record) = existing else {
        return TorrentRecord {
            hash: update.hash,
            name: update
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            files: update.files.clone().unwrap_or_default(),
            magnet_uri: update
                .magnet_uri
                .clone()
                .unwrap_or_else(|| update.hash.magnet_uri()),
            first_seen: now,
            last_seen: now,
            status: update.status,
            seen_count: 1,
            last_error: match update.status {
                ResolutionStatus::Success => None,
                _ => update.error.clone(),
            },
        };
    };

    record.last_seen = record.last_seen.max(now);
    record.seen_count += 1;

    if record.status.is_success() && !update.status.is_success() {
        return record;
    }

    record.status = update.status;
    if let Some(name) = &update.name {
        record.name = name.clone();
    }
    if let Some(files) = &update.files {
        record.files = files.clone();
    }
    if let Some(magnet_uri) = &update.magnet_uri {
        record.magnet_uri = magnet_uri.clone();
    }
    match update.status {
        ResolutionStatus::Success => record.last_error = None,
        ResolutionStatus::Error => record.last_error = update.error.clone(),
        ResolutionStatus::TimedOut => {}
    }

    record
}

impl RecordStore for SqliteRecordStore {
    fn lookup(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError> {
        let conn = self.conn()?;
        Self::lookup_in(&conn, hash)
    }

    fn upsert(&self, update: &UpsertRecord) -> Result<TorrentRecord, RecordError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RecordError::Database(e.to_string()))?;

        let existing = Self::lookup_in(&tx, &update.hash)?;
        let record = merge(existing, update, Self::now());
        Self::write(&tx, &record)?;

        tx.commit()
            .map_err(|e| RecordError::Database(e.to_string()))?;
        Ok(record)
    }

    fn touch(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RecordError::Database(e.to_string()))?;

        let Some(mut record) = Self::lookup_in(&tx, hash)? else {
            return Ok(None);
        };
        record.last_seen = record.last_seen.max(Self::now());
        record.seen_count += 1;
        Self::write(&tx, &record)?;

        tx.commit()
            .map_err(|e| RecordError::Database(e.to_string()))?;
        Ok(Some(record))
    }

    fn count_by_status(&self) -> Result<StatusCounts, RecordError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM torrents GROUP BY status")
            .map_err(|e| RecordError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((status, count))
            })
            .map_err(|e| RecordError::Database(e.to_string()))?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row.map_err(|e| RecordError::Database(e.to_string()))?;
            let count = count.max(0) as u64;
            match ResolutionStatus::parse(&status) {
                Some(ResolutionStatus::Success) => counts.success += count,
                Some(ResolutionStatus::TimedOut) => counts.timed_out += count,
                Some(ResolutionStatus::Error) => counts.error += count,
                None => {}
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hash(byte: u8) -> InfoHash {
        InfoHash::from_bytes([byte; 20])
    }

    fn create_test_store() -> SqliteRecordStore {
        SqliteRecordStore::in_memory().unwrap()
    }

    fn timed_out(h: InfoHash) -> UpsertRecord {
        UpsertRecord::status_only(h, ResolutionStatus::TimedOut)
            .with_name("Ubuntu ISO")
            .with_magnet_uri(h.magnet_uri())
    }

    fn success(h: InfoHash) -> UpsertRecord {
        UpsertRecord::status_only(h, ResolutionStatus::Success)
            .with_name("Ubuntu 24.04")
            .with_files(vec![TorrentFile::new("ubuntu.iso", 4_700_000_000)])
            .with_magnet_uri(h.magnet_uri())
    }

    #[test]
    fn test_lookup_missing() {
        let store = create_test_store();
        assert!(store.lookup(&hash(1)).unwrap().is_none());
    }

    #[test]
    fn test_insert_sets_both_timestamps() {
        let store = create_test_store();
        let record = store.upsert(&timed_out(hash(1))).unwrap();

        assert_eq!(record.first_seen, record.last_seen);
        assert_eq!(record.status, ResolutionStatus::TimedOut);
        assert_eq!(record.seen_count, 1);
        assert!(record.files.is_empty());

        let stored = store.lookup(&hash(1)).unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn test_insert_defaults_name_and_magnet() {
        let store = create_test_store();
        let record = store
            .upsert(&UpsertRecord::status_only(hash(2), ResolutionStatus::Error).with_error("boom"))
            .unwrap();

        assert_eq!(record.name, UNKNOWN_NAME);
        assert_eq!(record.magnet_uri, hash(2).magnet_uri());
        assert_eq!(record.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_update_keeps_first_seen_and_refines() {
        let store = create_test_store();
        let first = store.upsert(&timed_out(hash(1))).unwrap();
        let second = store.upsert(&success(hash(1))).unwrap();

        assert_eq!(second.first_seen, first.first_seen);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(second.status, ResolutionStatus::Success);
        assert_eq!(second.name, "Ubuntu 24.04");
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.seen_count, 2);
    }

    #[test]
    fn test_none_values_keep_stored_ones() {
        let store = create_test_store();
        store.upsert(&success(hash(1))).unwrap();

        let refreshed = store
            .upsert(&UpsertRecord::status_only(hash(1), ResolutionStatus::Success))
            .unwrap();
        assert_eq!(refreshed.name, "Ubuntu 24.04");
        assert_eq!(refreshed.files, vec![TorrentFile::new("ubuntu.iso", 4_700_000_000)]);
        assert_eq!(refreshed.magnet_uri, hash(1).magnet_uri());
    }

    #[test]
    fn test_success_is_never_downgraded() {
        let store = create_test_store();
        let first = store.upsert(&success(hash(1))).unwrap();

        let after = store
            .upsert(
                &UpsertRecord::status_only(hash(1), ResolutionStatus::Error)
                    .with_name("Other")
                    .with_files(Vec::new())
                    .with_error("late failure"),
            )
            .unwrap();

        assert_eq!(after.status, ResolutionStatus::Success);
        assert_eq!(after.name, first.name);
        assert_eq!(after.files, first.files);
        assert!(after.last_error.is_none());
        assert!(after.last_seen >= first.last_seen);
    }

    #[test]
    fn test_failures_may_oscillate() {
        let store = create_test_store();
        store.upsert(&timed_out(hash(3))).unwrap();
        let errored = store
            .upsert(&UpsertRecord::status_only(hash(3), ResolutionStatus::Error).with_error("x"))
            .unwrap();
        assert_eq!(errored.status, ResolutionStatus::Error);

        let again = store.upsert(&timed_out(hash(3))).unwrap();
        assert_eq!(again.status, ResolutionStatus::TimedOut);
        assert_eq!(again.last_error.as_deref(), Some("x"));
    }

    #[test]
    fn test_touch() {
        let store = create_test_store();
        assert!(store.touch(&hash(4)).unwrap().is_none());
        assert!(store.lookup(&hash(4)).unwrap().is_none());

        let created = store.upsert(&timed_out(hash(4))).unwrap();
        let touched = store.touch(&hash(4)).unwrap().unwrap();
        assert_eq!(touched.status, ResolutionStatus::TimedOut);
        assert_eq!(touched.seen_count, 2);
        assert_eq!(touched.first_seen, created.first_seen);
        assert!(touched.last_seen >= created.last_seen);
    }

    #[test]
    fn test_count_by_status() {
        let store = create_test_store();
        store.upsert(&success(hash(1))).unwrap();
        store.upsert(&timed_out(hash(2))).unwrap();
        store.upsert(&timed_out(hash(3))).unwrap();
        store
            .upsert(&UpsertRecord::status_only(hash(4), ResolutionStatus::Error))
            .unwrap();

        let counts = store.count_by_status().unwrap();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.timed_out, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_merge_never_moves_last_seen_backwards() {
        let now = Utc::now();
        let record = merge(None, &timed_out(hash(5)), now);

        let earlier = now - Duration::seconds(30);
        let merged = merge(Some(record.clone()), &timed_out(hash(5)), earlier);
        assert_eq!(merged.last_seen, now);
        assert_eq!(merged.first_seen, record.first_seen);
        assert!(merged.first_seen <= merged.last_seen);
    }

    #[test]
    fn test_file_based_store_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("records.db");

        {
            let store = SqliteRecordStore::new(&db_path).unwrap();
            store.upsert(&success(hash(9))).unwrap();
        }

        assert!(db_path.exists());
        let reopened = SqliteRecordStore::new(&db_path).unwrap();
        let record = reopened.lookup(&hash(9)).unwrap().unwrap();
        assert_eq!(record.status, ResolutionStatus::Success);
        assert_eq!(record.files[0].path, "ubuntu.iso");
    }
}
