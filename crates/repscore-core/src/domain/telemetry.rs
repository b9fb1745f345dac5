//! Execution telemetry: one record per task attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use repscore_state::ProviderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::{RepScoreError, Result};

/// Terminal outcome of a task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Timeout,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = RepScoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "error" => Ok(Outcome::Error),
            "timeout" => Ok(Outcome::Timeout),
            other => Err(RepScoreError::config(
                "outcome",
                format!("unrecognized value {other:?}"),
            )),
        }
    }
}

/// Observed result of one task execution against a provider.
///
/// A payload without `transaction_id` gets a fresh one. `timestamp` may be
/// RFC 3339 or epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default = "Uuid::new_v4")]
    pub transaction_id: Uuid,
    pub provider_id: ProviderId,
    #[serde(with = "repscore_state::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub latency_seconds: f64,
    pub cost_incurred: f64,
    /// Provider-reported or derived quality signal in [0, 1].
    pub confidence: f64,
}

impl Telemetry {
    pub fn new(
        provider_id: ProviderId,
        timestamp: DateTime<Utc>,
        outcome: Outcome,
        latency_seconds: f64,
        cost_incurred: f64,
        confidence: f64,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            provider_id,
            timestamp,
            outcome,
            latency_seconds,
            cost_incurred,
            confidence,
        }
    }

    /// Parse telemetry from JSON; missing or mistyped fields are malformed.
    pub fn from_json(provider_id: &ProviderId, raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| RepScoreError::malformed(provider_id.as_str(), "payload", e.to_string()))
    }

    /// Reject out-of-range values before they reach the score updater.
    pub fn validate(&self) -> Result<()> {
        let id = self.provider_id.as_str();
        if !self.latency_seconds.is_finite() || self.latency_seconds < 0.0 {
            return Err(RepScoreError::malformed(
                id,
                "latency_seconds",
                format!("{} must be a finite value >= 0", self.latency_seconds),
            ));
        }
        if !self.cost_incurred.is_finite() || self.cost_incurred < 0.0 {
            return Err(RepScoreError::malformed(
                id,
                "cost_incurred",
                format!("{} must be a finite value >= 0", self.cost_incurred),
            ));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(RepScoreError::malformed(
                id,
                "confidence",
                format!("{} outside [0, 1]", self.confidence),
            ));
        }
        Ok(())
    }

    /// JSON form written to the durable telemetry log.
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "transaction_id": self.transaction_id.to_string(),
            "timestamp": self.timestamp.to_rfc3339(),
            "outcome": self.outcome.as_str(),
            "latency_seconds": self.latency_seconds,
            "cost_incurred": self.cost_incurred,
            "confidence": self.confidence,
        })
    }
}
