//! RepScore-State: reputation record storage
//!
//! This crate owns all mutable trust state for the RepScore routing layer.
//! It knows nothing about scoring; it guarantees that every provider's
//! record changes only through one atomic read-modify-write operation and
//! that store invariants hold after every commit.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: per-provider atomicity, invariant enforcement, durable snapshots.
//!
//! ## Key Components
//!
//! - `ReputationStore`: async store trait with the single `update` operation
//! - `MemoryReputationStore`: lock-per-provider in-memory implementation
//! - `JsonSnapshotFile`: durable `SERVER#<id>` JSON snapshot
//! - `SnapshotPersister`: background task that saves commits off the hot path

mod error;
pub mod memory;
pub mod persister;
pub mod snapshot;
pub mod storage_traits;
pub mod timestamp;

pub use error::StorageError;
pub use memory::MemoryReputationStore;
pub use persister::{PersistHandle, SnapshotPersister};
pub use snapshot::{JsonSnapshotFile, PersistedRecord};
pub use storage_traits::{
    ProviderId, RecordTransition, RecordUpdate, ReputationRecord, ReputationStore, StorageResult,
};
