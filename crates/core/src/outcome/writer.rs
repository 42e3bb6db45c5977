use std::sync::Arc;

use tokio::sync::mpsc;

use super::{OutcomeEntry, OutcomeHandle, OutcomeSink};

/// Background task that appends queued outcomes to the sink.
pub struct OutcomeWriter {
    rx: mpsc::Receiver<OutcomeEntry>,
    sink: Arc<dyn OutcomeSink>,
}

impl OutcomeWriter {
    pub fn new(rx: mpsc::Receiver<OutcomeEntry>, sink: Arc<dyn OutcomeSink>) -> Self {
        Self { rx, sink }
    }

    /// Run until every `OutcomeHandle` has been dropped.
    ///
    /// Spawn this as a background task; awaiting it after the handles are
    /// dropped guarantees every queued entry reached the sink.
    pub async fn run(mut self) {
        tracing::info!("Outcome writer started");

        while let Some(entry) = self.rx.recv().await {
            if let Err(e) = self.sink.append(&entry) {
                tracing::error!(hash = %entry.hash, "Failed to append outcome entry: {}", e);
            }
        }

        tracing::info!("Outcome writer shutting down");
    }
}

/// Create the outcome log pipeline.
///
/// Returns the handle to clone into resolvers and the writer to spawn with
/// `tokio::spawn(writer.run())`.
pub fn create_outcome_log(
    sink: Arc<dyn OutcomeSink>,
    buffer_size: usize,
) -> (OutcomeHandle, OutcomeWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (OutcomeHandle::new(tx), OutcomeWriter::new(rx, sink))
}
