//! Storage trait definitions for RepScore
//!
//! The reputation store owns every provider's mutable trust state:
//! - `ReputationRecord`: last computed score, its timestamp, interaction count
//! - `ReputationStore`: registration, reads, and the single atomic update
//!
//! The trait is async and backend-agnostic. `MemoryReputationStore` in the
//! `memory` module is the in-process implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ProviderId
// ---------------------------------------------------------------------------

/// Identity of a registered provider (e.g. `"data_server_2"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        ProviderId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        ProviderId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ReputationRecord
// ---------------------------------------------------------------------------

/// Persisted trust state for one provider.
///
/// Invariants (checked by every store write):
/// - `0 <= score <= 1`
/// - `interaction_count` never decreases
/// - `last_updated_at` never moves backwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub provider_id: ProviderId,
    /// Score as of `last_updated_at`; decay is applied lazily by readers.
    pub score: f64,
    pub last_updated_at: DateTime<Utc>,
    pub interaction_count: u64,
}

impl ReputationRecord {
    /// A fresh record with no observed interactions.
    pub fn new(provider_id: ProviderId, score: f64, at: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            score,
            last_updated_at: at,
            interaction_count: 0,
        }
    }

    /// Check the per-record invariants.
    pub fn validate(&self) -> StorageResult<()> {
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(self.invalid(format!("score {} outside [0, 1]", self.score)));
        }
        Ok(())
    }

    /// Check that `next` is a legal successor of `self`.
    pub fn validate_transition(&self, next: &ReputationRecord) -> StorageResult<()> {
        if next.provider_id != self.provider_id {
            return Err(self.invalid(format!(
                "update attempted to rename record to {}",
                next.provider_id
            )));
        }
        next.validate()?;
        if next.interaction_count < self.interaction_count {
            return Err(self.invalid(format!(
                "interaction count would decrease from {} to {}",
                self.interaction_count, next.interaction_count
            )));
        }
        if next.last_updated_at < self.last_updated_at {
            return Err(self.invalid(format!(
                "last_updated_at would move backwards from {} to {}",
                self.last_updated_at, next.last_updated_at
            )));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> StorageError {
        StorageError::InvalidRecord {
            provider_id: self.provider_id.0.clone(),
            reason,
        }
    }
}

/// Before/after pair returned by a committed update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTransition {
    pub before: ReputationRecord,
    pub after: ReputationRecord,
}

/// Read-modify-write step executed inside a provider's critical section.
///
/// Receives the current record and returns its successor. Returning an error
/// aborts the update and leaves the record untouched.
pub type RecordUpdate =
    Box<dyn FnOnce(&ReputationRecord) -> StorageResult<ReputationRecord> + Send>;

// ---------------------------------------------------------------------------
// ReputationStore
// ---------------------------------------------------------------------------

/// Keyed reputation store.
///
/// Guarantees:
/// - `update` runs its closure and commits the result as one atomic unit per
///   provider; concurrent updates to the same provider are serialized and
///   never lose writes.
/// - Updates to different providers do not coordinate.
/// - Records are never deleted and never created implicitly by `update`.
#[async_trait]
pub trait ReputationStore: Send + Sync {
    /// Create the record for a newly registered provider.
    async fn register(&self, record: ReputationRecord) -> StorageResult<()>;

    /// Current stored record (no decay applied).
    async fn get(&self, provider_id: &ProviderId) -> StorageResult<ReputationRecord>;

    /// All stored records, ordered by provider id.
    async fn snapshot(&self) -> StorageResult<Vec<ReputationRecord>>;

    /// Atomically replace a provider's record with `apply(current)`.
    ///
    /// Fails with `ProviderNotFound` for unknown ids and `InvalidRecord` when
    /// the successor breaks an invariant; in both cases nothing is written.
    async fn update(
        &self,
        provider_id: &ProviderId,
        apply: RecordUpdate,
    ) -> StorageResult<RecordTransition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: f64) -> ReputationRecord {
        ReputationRecord::new(ProviderId::from("p1"), score, Utc::now())
    }

    #[test]
    fn test_validate_rejects_out_of_range_score() {
        assert!(record(0.5).validate().is_ok());
        assert!(record(1.0).validate().is_ok());
        assert!(record(-0.01).validate().is_err());
        assert!(record(1.01).validate().is_err());
        assert!(record(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_transition_rejects_count_decrease() {
        let mut before = record(0.5);
        before.interaction_count = 3;
        let mut after = before.clone();
        after.interaction_count = 2;
        let err = before.validate_transition(&after).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }

    #[test]
    fn test_transition_rejects_timestamp_regression() {
        let before = record(0.5);
        let mut after = before.clone();
        after.last_updated_at = before.last_updated_at - chrono::Duration::seconds(5);
        assert!(before.validate_transition(&after).is_err());
    }

    #[test]
    fn test_transition_accepts_equal_timestamp() {
        let before = record(0.5);
        let mut after = before.clone();
        after.score = 0.6;
        after.interaction_count = 1;
        assert!(before.validate_transition(&after).is_ok());
    }

    #[test]
    fn test_provider_id_display() {
        assert_eq!(ProviderId::from("semantic_db_6").to_string(), "semantic_db_6");
    }
}
