//! Human-readable explanation of routing decisions.
//!
//! Pure formatting over values that were already computed; nothing here
//! feeds back into scoring or selection.

use crate::config::RepScoreConfig;
use crate::domain::goal::PolicyWeights;
use crate::selection::RankedCandidate;

/// One-paragraph recommendation for the top-ranked candidate.
pub fn render_recommendation(ranking: &[RankedCandidate], config: &RepScoreConfig) -> String {
    let Some(best) = ranking.first() else {
        return "Recommendation: no available provider for this task.".to_string();
    };
    let provider = &best.candidate.provider;
    let mut summary = format!(
        "Recommendation: the best provider is {} (live score {:.4}, policy score {:.4}). ",
        provider.id, best.candidate.live_score, best.policy_score
    );
    if best.candidate.live_score < config.min_reputation_threshold {
        summary.push_str("WARNING: reputation is below the routing threshold; execution will be blocked.");
    } else if provider.cost_per_unit < config.cost_benchmark {
        summary.push_str("It is cost-efficient and trustworthy.");
    } else {
        summary.push_str("It meets reliability thresholds but has an average cost profile.");
    }
    summary
}

/// Describe how the goal shaped the selection weights.
pub fn render_weights(weights: &PolicyWeights) -> String {
    let mode = if weights.conservative {
        "confidence-adjusted"
    } else {
        "raw live"
    };
    format!(
        "Policy: minimum reputation {:.2} on {} scores; weights reputation {:.2}, accuracy {:.2}, latency {:.2}.",
        weights.min_reputation,
        mode,
        weights.weight_reputation,
        weights.weight_accuracy,
        weights.weight_latency
    )
}
