//! `RepScoreService`: the four external operations plus audit and
//! persistence wiring.
//!
//! One service owns one store. Routing reads and feedback writes may be
//! issued concurrently from any number of tasks through `&self`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repscore_state::{
    JsonSnapshotFile, MemoryReputationStore, ProviderId, ReputationRecord, ReputationStore,
    SnapshotPersister, StorageError,
};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::confidence::ConfidenceAdjuster;
use crate::config::RepScoreConfig;
use crate::decay::DecayEngine;
use crate::discovery::{Candidate, DiscoveryFilter};
use crate::domain::category::Category;
use crate::domain::error::{RepScoreError, Result};
use crate::domain::goal::{GoalDescriptor, PolicyWeights};
use crate::domain::provider::{Provider, ProviderRegistry};
use crate::domain::telemetry::Telemetry;
use crate::feedback::{FeedbackPipeline, FeedbackReceipt};
use crate::goal_policy::GoalPolicyMapper;
use crate::metrics::Metrics;
use crate::obs;
use crate::scoring::ScoreUpdater;
use crate::selection::{Selection, SelectionPolicy};

/// Result of a successful `route`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub provider_id: ProviderId,
    pub category: Category,
    pub goal: GoalDescriptor,
    pub weights: PolicyWeights,
    pub selection: Selection,
}

/// One row of [`RepScoreService::audit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub provider_id: ProviderId,
    pub category: Category,
    pub stored_score: f64,
    pub live_score: f64,
    pub interaction_count: u64,
    pub last_updated_at: DateTime<Utc>,
    /// Live score reaches `min_reputation_threshold`.
    pub selectable: bool,
}

pub struct RepScoreService {
    config: RepScoreConfig,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn ReputationStore>,
    decay: DecayEngine,
    discovery: DiscoveryFilter,
    mapper: GoalPolicyMapper,
    selection: SelectionPolicy,
    feedback: FeedbackPipeline,
    metrics: Metrics,
    persister: Option<SnapshotPersister>,
}

impl RepScoreService {
    /// Fresh in-memory service; every provider starts at its catalog seed
    /// or `default_initial_score`.
    pub async fn new(
        config: RepScoreConfig,
        registry: ProviderRegistry,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Self::with_store(config, registry, Arc::new(MemoryReputationStore::new()), now).await
    }

    /// Build over an existing store. Providers the store does not know yet
    /// are registered with their seed score.
    pub async fn with_store(
        config: RepScoreConfig,
        registry: ProviderRegistry,
        store: Arc<dyn ReputationStore>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;
        for provider in registry.iter() {
            match store.get(&provider.id).await {
                Ok(_) => {}
                Err(StorageError::ProviderNotFound { .. }) => {
                    store.register(seed_record(&config, provider, now)).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Self::assemble(config, Arc::new(registry), store))
    }

    /// Restore state from a snapshot file. Persisted records win over
    /// catalog seeds; entries for providers not in the registry are skipped.
    pub async fn hydrate(
        config: RepScoreConfig,
        registry: ProviderRegistry,
        snapshot: &JsonSnapshotFile,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let store: Arc<dyn ReputationStore> = Arc::new(MemoryReputationStore::new());
        let mut restored = 0usize;
        for record in snapshot.records() {
            if !registry.contains(&record.provider_id) {
                warn!(
                    provider_id = %record.provider_id,
                    "snapshot entry for unknown provider ignored"
                );
                continue;
            }
            let provider_id = record.provider_id.clone();
            match store.register(record).await {
                Ok(()) => restored += 1,
                Err(StorageError::InvalidRecord { reason, .. }) => {
                    warn!(
                        provider_id = %provider_id,
                        reason = %reason,
                        "invalid snapshot entry ignored"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            path = %snapshot.path().display(),
            restored = restored,
            providers = registry.len(),
            "reputation state hydrated"
        );
        Self::with_store(config, registry, store, now).await
    }

    fn assemble(
        config: RepScoreConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ReputationStore>,
    ) -> Self {
        let decay = DecayEngine::from_config(&config);
        let confidence = ConfidenceAdjuster::from_config(&config);
        let discovery = DiscoveryFilter::new(
            registry.clone(),
            store.clone(),
            decay,
            confidence,
            config.decay_warning_delta,
        );
        let feedback = FeedbackPipeline::new(
            registry.clone(),
            store.clone(),
            decay,
            ScoreUpdater::from_config(&config),
        );
        Self {
            mapper: GoalPolicyMapper::from_config(&config),
            selection: SelectionPolicy::new(config.max_acceptable_latency),
            config,
            registry,
            store,
            decay,
            discovery,
            feedback,
            metrics: Metrics::new(),
            persister: None,
        }
    }

    /// Hand every committed update to `persister`.
    pub fn with_persister(mut self, persister: SnapshotPersister) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn config(&self) -> &RepScoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Providers of `category` with live score >= `min_threshold`, best
    /// first. Scores are not confidence-adjusted.
    pub async fn discover(
        &self,
        category: Category,
        min_threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        self.discover_with(category, min_threshold, false, now).await
    }

    pub async fn discover_with(
        &self,
        category: Category,
        min_threshold: f64,
        conservative: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        self.discovery
            .discover(category, min_threshold, conservative, now)
            .await
    }

    /// Current decayed score. No side effects.
    ///
    /// An id outside the registry scores `default_initial_score`.
    pub async fn get_reputation(
        &self,
        provider_id: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        if !self.registry.contains(provider_id) {
            debug!(provider_id = %provider_id, "unregistered provider; reporting default score");
            return Ok(self.config.default_initial_score);
        }
        let record = self.store.get(provider_id).await?;
        Ok(self.decay.decayed(&record, now))
    }

    /// Goal mapping, discovery and selection in one call.
    pub async fn route(
        &self,
        category: Category,
        goal: GoalDescriptor,
        now: DateTime<Utc>,
    ) -> Result<RouteDecision> {
        self.route_inner(category, goal, now)
            .instrument(obs::route_span(category))
            .await
    }

    async fn route_inner(
        &self,
        category: Category,
        goal: GoalDescriptor,
        now: DateTime<Utc>,
    ) -> Result<RouteDecision> {
        let weights = self.mapper.map_goal(&goal);
        let considered = self.registry.by_category(category).len();
        let candidates = self
            .discovery
            .discover(category, weights.min_reputation, weights.conservative, now)
            .await?;

        match self
            .selection
            .select(category, candidates, &weights, considered)
        {
            Ok(selection) => {
                let chosen = selection.chosen();
                obs::emit_route_selected(
                    category,
                    chosen.provider_id(),
                    chosen.policy_score,
                    chosen.candidate.live_score,
                );
                self.metrics.inc_routes_selected();
                Ok(RouteDecision {
                    provider_id: chosen.provider_id().clone(),
                    category,
                    goal,
                    weights,
                    selection,
                })
            }
            Err(e) => {
                if let RepScoreError::NoEligibleProvider { threshold, .. } = &e {
                    obs::emit_route_blocked(category, *threshold, considered);
                    self.metrics.inc_routes_blocked();
                }
                Err(e)
            }
        }
    }

    /// Fold one telemetry record into the provider's reputation.
    ///
    /// Persistence, when attached, is queued after the commit and never
    /// fails the call.
    pub async fn submit_feedback(
        &self,
        provider_id: &ProviderId,
        telemetry: &Telemetry,
    ) -> Result<FeedbackReceipt> {
        let receipt = match self.feedback.submit(provider_id, telemetry).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.metrics.inc_feedback_rejected();
                return Err(e);
            }
        };
        self.metrics.inc_feedback_committed();

        if let Some(persister) = &self.persister {
            if let Err(e) = persister
                .handle_ref()
                .record_committed(receipt.record.clone(), Some(telemetry.to_log_entry()))
            {
                obs::emit_persist_failed(provider_id, &e);
            }
        }
        Ok(receipt)
    }

    /// Every provider's stored and live state, ordered by id.
    pub async fn audit(&self, now: DateTime<Utc>) -> Result<Vec<AuditEntry>> {
        let records = self.store.snapshot().await?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let provider = self.registry.get(&record.provider_id)?;
                let live_score = self.decay.decayed(&record, now);
                Some(AuditEntry {
                    category: provider.category,
                    stored_score: record.score,
                    live_score,
                    interaction_count: record.interaction_count,
                    last_updated_at: record.last_updated_at,
                    selectable: live_score >= self.config.min_reputation_threshold,
                    provider_id: record.provider_id,
                })
            })
            .collect())
    }

    /// Wait until every queued commit is on disk. No-op without a persister.
    pub async fn flush(&self) -> Result<()> {
        if let Some(persister) = &self.persister {
            persister.handle_ref().flush().await?;
        }
        Ok(())
    }

    /// Drain pending persistence and stop the persister.
    pub async fn shutdown(self) -> Result<()> {
        self.metrics.flush();
        if let Some(persister) = self.persister {
            persister.shutdown().await?;
        }
        Ok(())
    }
}

fn seed_record(
    config: &RepScoreConfig,
    provider: &Provider,
    now: DateTime<Utc>,
) -> ReputationRecord {
    ReputationRecord::new(
        provider.id.clone(),
        provider.initial_score.unwrap_or(config.default_initial_score),
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::goal::Level;
    use crate::domain::telemetry::Outcome;

    async fn service() -> (RepScoreService, DateTime<Utc>) {
        let now = Utc::now();
        let svc = RepScoreService::new(
            RepScoreConfig::default(),
            ProviderRegistry::reference_catalog(),
            now,
        )
        .await
        .unwrap();
        (svc, now)
    }

    #[tokio::test]
    async fn test_new_seeds_catalog_scores() {
        let (svc, now) = service().await;
        let data = svc
            .get_reputation(&ProviderId::from("data_server_2"), now)
            .await
            .unwrap();
        assert_eq!(data, 0.95);
        let low = svc
            .get_reputation(&ProviderId::from("low_score_server_3"), now)
            .await
            .unwrap();
        assert_eq!(low, 0.50);
    }

    #[tokio::test]
    async fn test_get_reputation_unknown_provider_is_default() {
        let (svc, now) = service().await;
        let score = svc
            .get_reputation(&ProviderId::from("nope"), now)
            .await
            .unwrap();
        assert_eq!(score, svc.config().default_initial_score);
        // nothing is registered as a side effect
        assert!(!svc.registry().contains(&ProviderId::from("nope")));
        let audit = svc.audit(now).await.unwrap();
        assert!(audit.iter().all(|a| a.provider_id.as_str() != "nope"));
    }

    #[tokio::test]
    async fn test_invalid_config_refuses_to_start() {
        let config = RepScoreConfig {
            weight_reliability: 0.5,
            ..RepScoreConfig::default()
        };
        let result =
            RepScoreService::new(config, ProviderRegistry::reference_catalog(), Utc::now()).await;
        assert!(matches!(result, Err(RepScoreError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_route_math_picks_seeded_server() {
        let (svc, now) = service().await;
        let decision = svc
            .route(Category::MathCompute, GoalDescriptor::default(), now)
            .await
            .unwrap();
        assert_eq!(decision.provider_id.as_str(), "compute_server_1");
        assert_eq!(svc.metrics().routes_selected(), 1);
    }

    #[tokio::test]
    async fn test_route_with_no_providers_is_blocked() {
        let (svc, now) = service().await;
        let err = svc
            .route(Category::Reasoning, GoalDescriptor::default(), now)
            .await
            .unwrap_err();
        match err {
            RepScoreError::NoEligibleProvider { considered, .. } => assert_eq!(considered, 0),
            other => panic!("Expected NoEligibleProvider, got {:?}", other),
        }
        assert_eq!(svc.metrics().routes_blocked(), 1);
    }

    #[tokio::test]
    async fn test_low_risk_route_is_conservative_on_fresh_state() {
        let (svc, now) = service().await;
        // zero interactions everywhere: confidence factor 0 blocks everything
        let goal = GoalDescriptor::new(Level::Low, Level::Medium, Level::Medium);
        let err = svc.route(Category::DataRetrieval, goal, now).await.unwrap_err();
        assert!(matches!(err, RepScoreError::NoEligibleProvider { .. }));
    }

    #[tokio::test]
    async fn test_feedback_counts_metrics() {
        let (svc, now) = service().await;
        let id = ProviderId::from("semantic_db_6");
        let t = Telemetry::new(id.clone(), now, Outcome::Success, 0.1, 0.002, 0.9);
        svc.submit_feedback(&id, &t).await.unwrap();
        let bad = Telemetry {
            latency_seconds: -1.0,
            ..t
        };
        assert!(svc.submit_feedback(&id, &bad).await.is_err());
        assert_eq!(svc.metrics().feedback_committed(), 1);
        assert_eq!(svc.metrics().feedback_rejected(), 1);
    }

    #[tokio::test]
    async fn test_audit_lists_every_provider() {
        let (svc, now) = service().await;
        let audit = svc.audit(now).await.unwrap();
        assert_eq!(audit.len(), 6);
        let low = audit
            .iter()
            .find(|e| e.provider_id.as_str() == "low_score_server_3")
            .unwrap();
        assert!(!low.selectable);
        assert_eq!(low.interaction_count, 0);
    }
}
