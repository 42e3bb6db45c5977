use tokio::sync::mpsc;

use super::OutcomeEntry;

/// Handle for recording terminal outcomes.
///
/// Cheaply cloneable; every resolution task holds one. Entries go through a
/// channel to the `OutcomeWriter`, which owns the sink.
#[derive(Clone)]
pub struct OutcomeHandle {
    tx: mpsc::Sender<OutcomeEntry>,
}

impl OutcomeHandle {
    pub fn new(tx: mpsc::Sender<OutcomeEntry>) -> Self {
        Self { tx }
    }

    /// Queue an entry, waiting for channel capacity.
    ///
    /// If the writer is gone the error is logged; the caller is never failed.
    pub async fn record(&self, entry: OutcomeEntry) {
        if let Err(e) = self.tx.send(entry).await {
            tracing::error!(hash = %e.0.hash, "Failed to queue outcome entry: writer closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;
    use crate::swarm::InfoHash;

    fn entry(byte: u8) -> OutcomeEntry {
        OutcomeEntry::new(InfoHash::from_bytes([byte; 20]), OutcomeStatus::TimedOut)
    }

    #[tokio::test]
    async fn test_record_entry() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = OutcomeHandle::new(tx);

        handle.record(entry(1)).await;

        let received = rx.recv().await.expect("Should receive entry");
        assert_eq!(received.hash, InfoHash::from_bytes([1; 20]));
    }

    #[tokio::test]
    async fn test_record_closed_channel() {
        let (tx, rx) = mpsc::channel::<OutcomeEntry>(10);
        let handle = OutcomeHandle::new(tx);
        drop(rx);

        // Must not panic
        handle.record(entry(3)).await;
    }
}
