//! Error types for repscore-state

use thiserror::Error;

/// Errors that can occur in the reputation persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record exists for the provider
    #[error("Provider not found: {provider_id}")]
    ProviderNotFound { provider_id: String },

    /// A record for the provider already exists
    #[error("Provider already registered: {provider_id}")]
    AlreadyRegistered { provider_id: String },

    /// A record would break a store invariant; the store is left unchanged
    #[error("Invalid record for {provider_id}: {reason}")]
    InvalidRecord { provider_id: String, reason: String },

    /// The update closure declined to produce a new record
    #[error("Update rejected for {provider_id}: {reason}")]
    Rejected { provider_id: String, reason: String },

    /// A lock guarding a record was poisoned by a panicking writer
    #[error("Record lock poisoned: {0}")]
    Poisoned(String),

    /// Snapshot file I/O failure
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The background persister is no longer running
    #[error("Persister unavailable: {0}")]
    PersisterClosed(String),
}

impl StorageError {
    pub(crate) fn poisoned(what: &str) -> Self {
        StorageError::Poisoned(what.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_names_provider() {
        let err = StorageError::ProviderNotFound {
            provider_id: "data_server_2".to_string(),
        };
        assert!(err.to_string().contains("data_server_2"));
    }

    #[test]
    fn test_invalid_record_display_carries_reason() {
        let err = StorageError::InvalidRecord {
            provider_id: "p".to_string(),
            reason: "score 1.5 outside [0, 1]".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid record"));
        assert!(msg.contains("outside [0, 1]"));
    }
}
