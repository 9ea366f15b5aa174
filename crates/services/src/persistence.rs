//! Fire-and-forget persistence for live session state.
//!
//! The engine mutates its in-memory state synchronously and hands the
//! matching store write to a `WriteQueue`. A single background task applies
//! writes in the order they were issued, so two writes to the same key can
//! never be reordered. Failed writes are logged and dropped.

use std::sync::Arc;

use serde::Serialize;
use storage::StoreKey;
use storage::repository::SessionStore;
use tokio::sync::{mpsc, oneshot};

enum WriteOp {
    Set { key: StoreKey, value: String },
    Remove { key: StoreKey },
    Flush(oneshot::Sender<()>),
}

/// Handle to the ordered write task. Cheap to clone.
#[derive(Clone)]
pub struct WriteQueue {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteQueue {
    /// Start the background writer for `store`.
    ///
    /// Must be called from within a Tokio runtime. The task exits once every
    /// handle has been dropped and the queue is drained.
    #[must_use]
    pub fn spawn(store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(store, rx));
        Self { tx }
    }

    /// Queue a JSON-encoded write.
    pub fn set_json<T: Serialize>(&self, key: StoreKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(value) => {
                tracing::debug!(%key, "queued session write");
                self.push(WriteOp::Set { key, value });
            }
            Err(err) => tracing::warn!(%key, error = %err, "dropping unserializable session write"),
        }
    }

    /// Queue a delete.
    pub fn remove(&self, key: StoreKey) {
        tracing::debug!(%key, "queued session delete");
        self.push(WriteOp::Remove { key });
    }

    /// Wait until every write queued before this call has been applied (or
    /// has failed).
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.push(WriteOp::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn push(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            tracing::warn!("session write queue is closed, dropping write");
        }
    }
}

async fn drain(store: Arc<dyn SessionStore>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Set { key, value } => {
                if let Err(err) = store.set(&key, &value).await {
                    tracing::warn!(%key, error = %err, "session write failed");
                }
            }
            WriteOp::Remove { key } => {
                if let Err(err) = store.remove(&key).await {
                    tracing::warn!(%key, error = %err, "session delete failed");
                }
            }
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
