//! Goal-conditioned ranking of discovered candidates.
//!
//! `policy = α * live + β * (1 - error_rate) + γ * (1 - min(latency / MAX, 1))`
//!
//! Ties fall through live score (desc), cost (asc), latency (asc), id (asc).
//! All comparisons are exact, so the ordering is total and stable across runs.

use std::cmp::Ordering;

use repscore_state::ProviderId;
use serde::Serialize;

use crate::discovery::Candidate;
use crate::domain::category::Category;
use crate::domain::error::{RepScoreError, Result};
use crate::domain::goal::PolicyWeights;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub accuracy_estimate: f64,
    pub normalized_latency: f64,
    pub policy_score: f64,
}

impl RankedCandidate {
    pub fn provider_id(&self) -> &ProviderId {
        &self.candidate.provider.id
    }
}

/// Outcome of a selection: the winner first, then the rest in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    ranking: Vec<RankedCandidate>,
}

impl Selection {
    pub fn ranking(&self) -> &[RankedCandidate] {
        &self.ranking
    }

    pub fn chosen(&self) -> &RankedCandidate {
        // `select` never builds an empty ranking
        &self.ranking[0]
    }

    pub fn provider_id(&self) -> &ProviderId {
        self.chosen().provider_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    max_acceptable_latency: f64,
}

impl SelectionPolicy {
    pub fn new(max_acceptable_latency: f64) -> Self {
        Self {
            max_acceptable_latency,
        }
    }

    pub fn rank(&self, candidate: Candidate, weights: &PolicyWeights) -> RankedCandidate {
        let accuracy_estimate = (1.0 - candidate.provider.base_error_rate).clamp(0.0, 1.0);
        let normalized_latency =
            (candidate.provider.base_avg_latency / self.max_acceptable_latency).clamp(0.0, 1.0);
        let policy_score = weights.weight_reputation * candidate.live_score
            + weights.weight_accuracy * accuracy_estimate
            + weights.weight_latency * (1.0 - normalized_latency);
        RankedCandidate {
            candidate,
            accuracy_estimate,
            normalized_latency,
            policy_score,
        }
    }

    /// Rank `candidates` and return the full ordering.
    ///
    /// `considered` is the number of providers examined before filtering and
    /// only feeds the `NoEligibleProvider` error.
    pub fn select(
        &self,
        category: Category,
        candidates: Vec<Candidate>,
        weights: &PolicyWeights,
        considered: usize,
    ) -> Result<Selection> {
        if candidates.is_empty() {
            return Err(RepScoreError::NoEligibleProvider {
                category,
                threshold: weights.min_reputation,
                considered,
            });
        }
        let mut ranking: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|c| self.rank(c, weights))
            .collect();
        ranking.sort_by(compare);
        Ok(Selection { ranking })
    }
}

fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    let (pa, pb) = (&a.candidate.provider, &b.candidate.provider);
    b.policy_score
        .total_cmp(&a.policy_score)
        .then_with(|| b.candidate.live_score.total_cmp(&a.candidate.live_score))
        .then_with(|| pa.cost_per_unit.total_cmp(&pb.cost_per_unit))
        .then_with(|| pa.base_avg_latency.total_cmp(&pb.base_avg_latency))
        .then_with(|| pa.id.cmp(&pb.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::Provider;

    fn weights() -> PolicyWeights {
        PolicyWeights {
            min_reputation: 0.7,
            weight_reputation: 0.5,
            weight_accuracy: 0.25,
            weight_latency: 0.25,
            conservative: false,
        }
    }

    fn candidate(provider: Provider, live: f64) -> Candidate {
        Candidate {
            provider,
            live_score: live,
            decayed_score: live,
            stored_score: live,
            interaction_count: 10,
        }
    }

    #[test]
    fn test_empty_candidates_is_no_eligible_provider() {
        let err = SelectionPolicy::new(0.8)
            .select(Category::MathCompute, vec![], &weights(), 2)
            .unwrap_err();
        match err {
            RepScoreError::NoEligibleProvider {
                category,
                threshold,
                considered,
            } => {
                assert_eq!(category, Category::MathCompute);
                assert_eq!(threshold, 0.7);
                assert_eq!(considered, 2);
            }
            other => panic!("Expected NoEligibleProvider, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_score_components() {
        let p = Provider::new("p", Category::ImageGen, 0.01, 0.25, 0.4);
        let ranked = SelectionPolicy::new(0.8).rank(candidate(p, 0.75), &weights());
        assert_eq!(ranked.accuracy_estimate, 0.75);
        assert_eq!(ranked.normalized_latency, 0.5);
        assert!((ranked.policy_score - 0.6875).abs() < 1e-12);
    }

    #[test]
    fn test_tie_on_policy_score_picks_cheaper() {
        let pricey = Provider::new("a_pricey", Category::ImageGen, 0.05, 0.25, 0.4);
        let cheap = Provider::new("z_cheap", Category::ImageGen, 0.01, 0.25, 0.4);
        let selection = SelectionPolicy::new(0.8)
            .select(
                Category::ImageGen,
                vec![candidate(pricey, 0.75), candidate(cheap, 0.75)],
                &weights(),
                2,
            )
            .unwrap();
        assert_eq!(selection.provider_id().as_str(), "z_cheap");
    }

    #[test]
    fn test_tie_on_policy_score_prefers_higher_live_score() {
        // reputation weight 0 keeps the policy scores equal
        let weights = PolicyWeights {
            weight_reputation: 0.0,
            weight_accuracy: 0.5,
            weight_latency: 0.5,
            ..weights()
        };
        let cheap = Provider::new("a_cheap", Category::ImageGen, 0.01, 0.25, 0.4);
        let trusted = Provider::new("z_trusted", Category::ImageGen, 0.05, 0.25, 0.4);
        let selection = SelectionPolicy::new(0.8)
            .select(
                Category::ImageGen,
                vec![candidate(cheap, 0.75), candidate(trusted, 0.875)],
                &weights,
                2,
            )
            .unwrap();
        assert_eq!(
            selection.ranking[0].policy_score,
            selection.ranking[1].policy_score
        );
        assert_eq!(selection.provider_id().as_str(), "z_trusted");
    }

    #[test]
    fn test_tie_on_policy_live_and_cost_prefers_lower_latency() {
        // latency weight 0 keeps the policy scores equal
        let weights = PolicyWeights {
            weight_reputation: 0.5,
            weight_accuracy: 0.5,
            weight_latency: 0.0,
            ..weights()
        };
        let slow = Provider::new("a_slow", Category::ImageGen, 0.01, 0.25, 0.5);
        let fast = Provider::new("z_fast", Category::ImageGen, 0.01, 0.25, 0.25);
        let selection = SelectionPolicy::new(0.8)
            .select(
                Category::ImageGen,
                vec![candidate(slow, 0.75), candidate(fast, 0.75)],
                &weights,
                2,
            )
            .unwrap();
        assert_eq!(selection.provider_id().as_str(), "z_fast");
        assert_eq!(selection.ranking[1].candidate.provider.id.as_str(), "a_slow");
    }

    #[test]
    fn test_full_tie_falls_back_to_id() {
        let a = Provider::new("alpha", Category::ImageGen, 0.01, 0.25, 0.4);
        let b = Provider::new("beta", Category::ImageGen, 0.01, 0.25, 0.4);
        let selection = SelectionPolicy::new(0.8)
            .select(
                Category::ImageGen,
                vec![candidate(b, 0.75), candidate(a, 0.75)],
                &weights(),
                2,
            )
            .unwrap();
        assert_eq!(selection.provider_id().as_str(), "alpha");
        assert_eq!(selection.ranking.len(), 2);
    }

    #[test]
    fn test_latency_saturates_at_max() {
        let slow = Provider::new("slow", Category::ImageGen, 0.01, 0.0, 1.5);
        let ranked = SelectionPolicy::new(0.8).rank(candidate(slow, 1.0), &weights());
        assert_eq!(ranked.normalized_latency, 1.0);
        assert!((ranked.policy_score - 0.75).abs() < 1e-12);
    }
}
