//! In-memory reputation store with per-provider locks.
//!
//! The outer map is only write-locked during registration. Each provider has
//! a writer `Mutex` that serializes its read-modify-write cycles, and a
//! separate `RwLock` around the committed record. The update closure runs
//! while only the writer lock is held, so `get` and `snapshot` see the last
//! committed record instead of waiting on an update in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug)]
struct Slot {
    writer: Mutex<()>,
    committed: RwLock<ReputationRecord>,
}

impl Slot {
    fn new(record: ReputationRecord) -> Self {
        Self {
            writer: Mutex::new(()),
            committed: RwLock::new(record),
        }
    }

    fn read(&self, provider_id: &ProviderId) -> StorageResult<ReputationRecord> {
        self.committed
            .read()
            .map(|r| r.clone())
            .map_err(|_| StorageError::poisoned(provider_id.as_str()))
    }
}

/// In-memory reputation store backed by `HashMap<ProviderId, Slot>`.
#[derive(Debug, Default)]
pub struct MemoryReputationStore {
    records: RwLock<HashMap<ProviderId, Arc<Slot>>>,
}

impl MemoryReputationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, provider_id: &ProviderId) -> StorageResult<Arc<Slot>> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::poisoned("record map"))?;
        records
            .get(provider_id)
            .cloned()
            .ok_or_else(|| StorageError::ProviderNotFound {
                provider_id: provider_id.0.clone(),
            })
    }
}

#[async_trait]
impl ReputationStore for MemoryReputationStore {
    async fn register(&self, record: ReputationRecord) -> StorageResult<()> {
        record.validate()?;
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::poisoned("record map"))?;
        if records.contains_key(&record.provider_id) {
            return Err(StorageError::AlreadyRegistered {
                provider_id: record.provider_id.0.clone(),
            });
        }
        records.insert(record.provider_id.clone(), Arc::new(Slot::new(record)));
        Ok(())
    }

    async fn get(&self, provider_id: &ProviderId) -> StorageResult<ReputationRecord> {
        self.slot(provider_id)?.read(provider_id)
    }

    async fn snapshot(&self) -> StorageResult<Vec<ReputationRecord>> {
        let slots: Vec<(ProviderId, Arc<Slot>)> = {
            let records = self
                .records
                .read()
                .map_err(|_| StorageError::poisoned("record map"))?;
            records
                .iter()
                .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
                .collect()
        };
        let mut out = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            out.push(slot.read(&id)?);
        }
        out.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        Ok(out)
    }

    async fn update(
        &self,
        provider_id: &ProviderId,
        apply: RecordUpdate,
    ) -> StorageResult<RecordTransition> {
        let slot = self.slot(provider_id)?;
        let _writer = slot
            .writer
            .lock()
            .map_err(|_| StorageError::poisoned(provider_id.as_str()))?;
        let before = slot.read(provider_id)?;
        let next = apply(&before)?;
        before.validate_transition(&next)?;
        let mut committed = slot
            .committed
            .write()
            .map_err(|_| StorageError::poisoned(provider_id.as_str()))?;
        *committed = next.clone();
        Ok(RecordTransition {
            before,
            after: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_then_get() {
        let store = MemoryReputationStore::new();
        let record = ReputationRecord::new(ProviderId::from("p1"), 0.5, Utc::now());
        store.register(record.clone()).await.unwrap();
        assert_eq!(store.get(&ProviderId::from("p1")).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_failed_closure_leaves_record_untouched() {
        let store = MemoryReputationStore::new();
        let record = ReputationRecord::new(ProviderId::from("p1"), 0.5, Utc::now());
        store.register(record.clone()).await.unwrap();

        let err = store
            .update(
                &ProviderId::from("p1"),
                Box::new(|r: &ReputationRecord| {
                    Err(StorageError::Rejected {
                        provider_id: r.provider_id.0.clone(),
                        reason: "nope".to_string(),
                    })
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
        assert_eq!(store.get(&ProviderId::from("p1")).await.unwrap(), record);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_reads_committed_record_during_update() {
        let store = Arc::new(MemoryReputationStore::new());
        let id = ProviderId::from("p1");
        let record = ReputationRecord::new(id.clone(), 0.5, Utc::now());
        store.register(record.clone()).await.unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let writer = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move {
                store
                    .update(
                        &id,
                        Box::new(move |r: &ReputationRecord| {
                            entered_tx.send(()).unwrap();
                            release_rx.recv().unwrap();
                            let mut next = r.clone();
                            next.score = 0.75;
                            next.interaction_count += 1;
                            Ok(next)
                        }),
                    )
                    .await
            })
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let reader = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move { store.get(&id).await })
        };
        let seen = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("get waited on the update in flight")
            .unwrap()
            .unwrap();
        assert_eq!(seen, record);
        let listed = store.snapshot().await.unwrap();
        assert_eq!(listed, vec![record]);

        release_tx.send(()).unwrap();
        let transition = writer.await.unwrap().unwrap();
        assert_eq!(transition.after.score, 0.75);
        assert_eq!(store.get(&id).await.unwrap().interaction_count, 1);
    }
}
