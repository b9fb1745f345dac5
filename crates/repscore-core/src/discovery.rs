//! Category discovery over live (decayed, optionally confidence-adjusted)
//! scores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repscore_state::ReputationStore;
use serde::Serialize;

use crate::confidence::ConfidenceAdjuster;
use crate::decay::DecayEngine;
use crate::domain::category::Category;
use crate::domain::error::Result;
use crate::domain::provider::{Provider, ProviderRegistry};
use crate::obs;

/// A provider that passed the threshold, with the scores it was judged on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub provider: Provider,
    /// Score used for filtering and ranking.
    pub live_score: f64,
    /// Decayed score before any confidence adjustment.
    pub decayed_score: f64,
    pub stored_score: f64,
    pub interaction_count: u64,
}

/// Read path: registry + store through decay and confidence.
#[derive(Clone)]
pub struct DiscoveryFilter {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ReputationStore>,
    decay: DecayEngine,
    confidence: ConfidenceAdjuster,
    decay_warning_delta: f64,
}

impl DiscoveryFilter {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ReputationStore>,
        decay: DecayEngine,
        confidence: ConfidenceAdjuster,
        decay_warning_delta: f64,
    ) -> Self {
        Self {
            registry,
            store,
            decay,
            confidence,
            decay_warning_delta,
        }
    }

    /// Every provider of `category` scored as of `now`, ordered by id.
    pub async fn score_category(
        &self,
        category: Category,
        conservative: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let mut scored = Vec::new();
        for provider in self.registry.by_category(category) {
            let record = self.store.get(&provider.id).await?;
            let decayed = self.decay.decayed(&record, now);
            if record.score - decayed > self.decay_warning_delta {
                obs::emit_reputation_decayed(&provider.id, record.score, decayed);
            }
            scored.push(Candidate {
                provider: provider.clone(),
                live_score: self
                    .confidence
                    .apply(decayed, record.interaction_count, conservative),
                decayed_score: decayed,
                stored_score: record.score,
                interaction_count: record.interaction_count,
            });
        }
        Ok(scored)
    }

    /// Providers of `category` whose live score is at least `min_threshold`,
    /// best first (live score descending, then id).
    ///
    /// An empty result is not an error.
    pub async fn discover(
        &self,
        category: Category,
        min_threshold: f64,
        conservative: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<Candidate> = self
            .score_category(category, conservative, now)
            .await?
            .into_iter()
            .filter(|c| c.live_score >= min_threshold)
            .collect();
        candidates.sort_by(|a, b| {
            b.live_score
                .total_cmp(&a.live_score)
                .then_with(|| a.provider.id.cmp(&b.provider.id))
        });
        Ok(candidates)
    }
}
