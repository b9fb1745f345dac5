//! Background persister that writes committed records to the snapshot file.
//!
//! Callers hand events over an unbounded channel and never wait on disk I/O.
//! The task drains whatever is queued, applies it to the snapshot image and
//! saves once per batch.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::snapshot::JsonSnapshotFile;
use crate::storage_traits::{ReputationRecord, StorageResult};

enum PersistCommand {
    Commit {
        record: ReputationRecord,
        telemetry: Option<serde_json::Value>,
    },
    Flush(oneshot::Sender<StorageResult<()>>),
}

/// Cheap, cloneable sending side of a [`SnapshotPersister`].
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl std::fmt::Debug for PersistCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistCommand::Commit { record, .. } => {
                write!(f, "Commit({})", record.provider_id)
            }
            PersistCommand::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl PersistHandle {
    /// Queue a committed record (and optionally its telemetry) for saving.
    pub fn record_committed(
        &self,
        record: ReputationRecord,
        telemetry: Option<serde_json::Value>,
    ) -> StorageResult<()> {
        self.tx
            .send(PersistCommand::Commit { record, telemetry })
            .map_err(|_| StorageError::PersisterClosed("commit queue closed".to_string()))
    }

    /// Wait until everything queued before this call is on disk.
    pub async fn flush(&self) -> StorageResult<()> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(PersistCommand::Flush(done))
            .map_err(|_| StorageError::PersisterClosed("commit queue closed".to_string()))?;
        wait.await
            .map_err(|_| StorageError::PersisterClosed("persister dropped flush".to_string()))?
    }
}

/// Owns the persister task.
pub struct SnapshotPersister {
    handle: PersistHandle,
    task: JoinHandle<JsonSnapshotFile>,
}

impl SnapshotPersister {
    /// Spawn the persister on the current tokio runtime.
    pub fn spawn(file: JsonSnapshotFile, log_capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(file, rx, log_capacity));
        Self {
            handle: PersistHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> PersistHandle {
        self.handle.clone()
    }

    pub fn handle_ref(&self) -> &PersistHandle {
        &self.handle
    }

    /// Drain the queue, save, and stop the task.
    ///
    /// Other clones of the handle must be dropped for the task to exit.
    pub async fn shutdown(self) -> StorageResult<JsonSnapshotFile> {
        self.handle.flush().await?;
        drop(self.handle);
        self.task
            .await
            .map_err(|e| StorageError::PersisterClosed(e.to_string()))
    }
}

async fn run(
    mut file: JsonSnapshotFile,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
    log_capacity: usize,
) -> JsonSnapshotFile {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        let mut dirty = false;
        let mut waiters = Vec::new();
        for command in batch {
            match command {
                PersistCommand::Commit { record, telemetry } => {
                    if let Some(entry) = telemetry {
                        file.append_log(&record.provider_id, entry, log_capacity);
                    }
                    file.upsert_record(&record);
                    dirty = true;
                }
                PersistCommand::Flush(done) => waiters.push(done),
            }
        }

        let outcome = if dirty { file.save() } else { Ok(()) };
        match &outcome {
            Ok(()) if dirty => debug!(path = %file.path().display(), "snapshot saved"),
            Ok(()) => {}
            Err(e) => warn!(event = "persist.failed", path = %file.path().display(), error = %e),
        }
        for done in waiters {
            let reply = match &outcome {
                Ok(()) => Ok(()),
                Err(e) => Err(StorageError::PersisterClosed(format!("save failed: {e}"))),
            };
            let _ = done.send(reply);
        }
    }
    file
}
