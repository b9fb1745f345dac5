//! Domain-level error taxonomy for RepScore.
//!
//! Provider-side failures (Error/Timeout outcomes) are not errors here; they
//! are ordinary telemetry that lowers reputation through the update path.

use repscore_state::StorageError;

use crate::domain::category::Category;

/// RepScore domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RepScoreError {
    /// Invalid configuration, catalog, or goal/category value. Fatal at startup.
    #[error("configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("unknown provider: {provider_id}")]
    UnknownProvider { provider_id: String },

    #[error(
        "no eligible provider for {category}: none of {considered} candidates reached threshold {threshold:.2}"
    )]
    NoEligibleProvider {
        category: Category,
        threshold: f64,
        considered: usize,
    },

    #[error("malformed telemetry for {provider_id}: {field} {reason}")]
    MalformedTelemetry {
        provider_id: String,
        field: String,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepScoreError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RepScoreError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(
        provider_id: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RepScoreError::MalformedTelemetry {
            provider_id: provider_id.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for RepScore domain operations.
pub type Result<T> = std::result::Result<T, RepScoreError>;
