//! Write path: telemetry → decayed prior → smoothed score → atomic commit.

use std::sync::Arc;

use repscore_state::{ProviderId, ReputationRecord, ReputationStore, StorageError};
use serde::Serialize;

use crate::decay::DecayEngine;
use crate::domain::error::{RepScoreError, Result};
use crate::domain::provider::ProviderRegistry;
use crate::domain::telemetry::Telemetry;
use crate::obs;
use crate::scoring::{ObservationFactors, ScoreUpdater};

/// Confirmation of one committed observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReceipt {
    pub provider_id: ProviderId,
    /// Stored score decayed to the telemetry timestamp.
    pub prior_score: f64,
    pub raw_score: f64,
    pub new_score: f64,
    pub interaction_count: u64,
    pub factors: ObservationFactors,
    /// The record as committed.
    pub record: ReputationRecord,
}

#[derive(Clone)]
pub struct FeedbackPipeline {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ReputationStore>,
    decay: DecayEngine,
    updater: ScoreUpdater,
}

impl FeedbackPipeline {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ReputationStore>,
        decay: DecayEngine,
        updater: ScoreUpdater,
    ) -> Self {
        Self {
            registry,
            store,
            decay,
            updater,
        }
    }

    /// Fold one observation into the provider's record.
    ///
    /// The read-decay-update-write cycle runs inside the store's per-provider
    /// critical section. On any error the record is left untouched.
    pub async fn submit(
        &self,
        provider_id: &ProviderId,
        telemetry: &Telemetry,
    ) -> Result<FeedbackReceipt> {
        match self.commit(provider_id, telemetry).await {
            Ok(receipt) => {
                obs::emit_feedback_committed(
                    provider_id,
                    receipt.prior_score,
                    receipt.new_score,
                    receipt.interaction_count,
                );
                Ok(receipt)
            }
            Err(e) => {
                obs::emit_feedback_rejected(provider_id, &e);
                Err(e)
            }
        }
    }

    async fn commit(
        &self,
        provider_id: &ProviderId,
        telemetry: &Telemetry,
    ) -> Result<FeedbackReceipt> {
        let provider = self
            .registry
            .get(provider_id)
            .ok_or_else(|| RepScoreError::UnknownProvider {
                provider_id: provider_id.to_string(),
            })?;
        if &telemetry.provider_id != provider_id {
            return Err(RepScoreError::malformed(
                provider_id.as_str(),
                "provider_id",
                format!("telemetry is addressed to {}", telemetry.provider_id),
            ));
        }
        telemetry.validate()?;

        let base_error_rate = provider.base_error_rate;
        let decay = self.decay;
        let updater = self.updater.clone();
        let observed = telemetry.clone();
        let transition = self
            .store
            .update(
                provider_id,
                Box::new(move |current: &ReputationRecord| {
                    let prior = decay.decayed(current, observed.timestamp);
                    let (score, _) = updater.update(prior, &observed, base_error_rate);
                    let mut next = current.clone();
                    next.score = score;
                    next.last_updated_at = current.last_updated_at.max(observed.timestamp);
                    next.interaction_count = current.interaction_count.saturating_add(1);
                    Ok(next)
                }),
            )
            .await
            .map_err(|e| match e {
                StorageError::ProviderNotFound { provider_id } => {
                    RepScoreError::UnknownProvider { provider_id }
                }
                other => RepScoreError::Storage(other),
            })?;

        // Same pure inputs as inside the critical section.
        let prior_score = self.decay.decayed(&transition.before, telemetry.timestamp);
        let factors = self.updater.factors(telemetry, base_error_rate);
        Ok(FeedbackReceipt {
            provider_id: provider_id.clone(),
            prior_score,
            raw_score: factors.raw,
            new_score: transition.after.score,
            interaction_count: transition.after.interaction_count,
            factors,
            record: transition.after,
        })
    }
}
