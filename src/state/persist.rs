//! Subscribe-on-write persistence.
//!
//! Stores hand a serialized snapshot to [`Persister::persist`] after every
//! committed mutation and return immediately. A single background task drains
//! the queue in order, so the last committed snapshot is the last one written.

use crate::storage::PersistAdapter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum PersistCommand {
    Write(String),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistCommand>,
    key: String,
}

impl Persister {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(adapter: PersistAdapter, key: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PersistCommand>();
        let task_key = key.to_string();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    PersistCommand::Write(raw) => {
                        if !adapter.set_item(&task_key, &raw).await {
                            warn!(key = %task_key, "Snapshot write dropped");
                        }
                    }
                    PersistCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!(key = %task_key, "Persister stopped");
        });

        Self {
            tx,
            key: key.to_string(),
        }
    }

    /// Queue a snapshot write without waiting for it
    pub fn persist<T: Serialize>(&self, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to serialize snapshot");
                return;
            }
        };
        if self.tx.send(PersistCommand::Write(raw)).is_err() {
            warn!(key = %self.key, "Persister is gone, snapshot not written");
        }
    }

    /// Wait until every write queued before this call has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Read a persisted snapshot, `None` when absent or unreadable
pub async fn load<T: DeserializeOwned>(adapter: &PersistAdapter, key: &str) -> Option<T> {
    let raw = adapter.get_item(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Persisted snapshot is unreadable, starting fresh");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KvStore;

    #[tokio::test]
    async fn test_writes_land_in_order() {
        let kv = KvStore::in_memory();
        let persister = Persister::spawn(kv.adapter(), "counter");

        for i in 0..20u32 {
            persister.persist(&i);
        }
        persister.flush().await;

        assert_eq!(kv.get::<u32>("counter").await, Some(19));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let kv = KvStore::in_memory();
        assert_eq!(load::<u32>(&kv.adapter(), "nothing").await, None);
    }
}
