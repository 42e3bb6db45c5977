//! In-memory outcome sink for testing.

use std::sync::Mutex;

use crate::outcome::{OutcomeEntry, OutcomeSink, SinkError};

/// Collects outcome entries in memory instead of writing a file.
#[derive(Debug, Default)]
pub struct MemoryOutcomeSink {
    entries: Mutex<Vec<OutcomeEntry>>,
}

impl MemoryOutcomeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn entries(&self) -> Vec<OutcomeEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// The entries rendered exactly as the file sink would write them.
    pub fn rendered(&self) -> String {
        self.entries().iter().map(OutcomeEntry::render).collect()
    }
}

impl OutcomeSink for MemoryOutcomeSink {
    fn append(&self, entry: &OutcomeEntry) -> Result<(), SinkError> {
        self.entries
            .lock()
            .map_err(|e| SinkError::Io(e.to_string()))?
            .push(entry.clone());
        Ok(())
    }
}
