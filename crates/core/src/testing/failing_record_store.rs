//! Record store wrapper with switchable failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::record::{
    RecordError, RecordStore, StatusCounts, TorrentRecord, UpsertRecord,
};
use crate::swarm::InfoHash;

/// Delegates to an inner store, failing every call while switched on.
pub struct FailingRecordStore {
    inner: Arc<dyn RecordStore>,
    failing: AtomicBool,
    failures: AtomicUsize,
}

impl FailingRecordStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls rejected so far.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RecordError> {
        if self.failing.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(RecordError::Database("database is locked".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for FailingRecordStore {
    fn lookup(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError> {
        self.check()?;
        self.inner.lookup(hash)
    }

    fn upsert(&self, record: &UpsertRecord) -> Result<TorrentRecord, RecordError> {
        self.check()?;
        self.inner.upsert(record)
    }

    fn touch(&self, hash: &InfoHash) -> Result<Option<TorrentRecord>, RecordError> {
        self.check()?;
        self.inner.touch(hash)
    }

    fn count_by_status(&self) -> Result<StatusCounts, RecordError> {
        self.check()?;
        self.inner.count_by_status()
    }
}
