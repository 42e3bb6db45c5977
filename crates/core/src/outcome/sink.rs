use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

use super::OutcomeEntry;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(String),
}

/// Append-only destination for outcome entries.
pub trait OutcomeSink: Send + Sync {
    /// Append one entry and make it durable before returning.
    fn append(&self, entry: &OutcomeEntry) -> Result<(), SinkError>;
}

/// Text file sink. Entries are appended and flushed one at a time.
pub struct FileOutcomeSink {
    file: Mutex<File>,
}

impl FileOutcomeSink {
    /// Open the log file in append mode, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::Io(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SinkError::Io(e.to_string()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl OutcomeSink for FileOutcomeSink {
    fn append(&self, entry: &OutcomeEntry) -> Result<(), SinkError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| SinkError::Io("log file lock poisoned".to_string()))?;

        file.write_all(entry.render().as_bytes())
            .map_err(|e| SinkError::Io(e.to_string()))?;
        file.flush().map_err(|e| SinkError::Io(e.to_string()))?;

        Ok(())
    }
}
