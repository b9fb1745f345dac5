//! Weighted-factor observation scoring and EMA smoothing.

use serde::Serialize;

use crate::config::RepScoreConfig;
use crate::domain::telemetry::Telemetry;

/// The four bounded sub-scores of one observation and their weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObservationFactors {
    pub reliability: f64,
    pub latency_penalty: f64,
    pub cost_efficiency: f64,
    pub satisfaction: f64,
    pub raw: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdater {
    weight_satisfaction: f64,
    weight_reliability: f64,
    weight_latency_penalty: f64,
    weight_cost_efficiency: f64,
    alpha: f64,
    max_acceptable_latency: f64,
    cost_benchmark: f64,
    reliability_blend: f64,
}

impl ScoreUpdater {
    /// Build from a config that has already passed `validate()`.
    pub fn from_config(config: &RepScoreConfig) -> Self {
        Self {
            weight_satisfaction: config.weight_satisfaction,
            weight_reliability: config.weight_reliability,
            weight_latency_penalty: config.weight_latency_penalty,
            weight_cost_efficiency: config.weight_cost_efficiency,
            alpha: config.alpha_smoothing,
            max_acceptable_latency: config.max_acceptable_latency,
            cost_benchmark: config.cost_benchmark,
            reliability_blend: config.reliability_blend,
        }
    }

    pub fn factors(&self, telemetry: &Telemetry, base_error_rate: f64) -> ObservationFactors {
        let success = telemetry.outcome.is_success();
        let binary = if success { 1.0 } else { 0.0 };
        let reliability = ((1.0 - self.reliability_blend) * binary
            + self.reliability_blend * (1.0 - base_error_rate))
            .clamp(0.0, 1.0);
        let latency_penalty =
            (1.0 - telemetry.latency_seconds / self.max_acceptable_latency).clamp(0.0, 1.0);
        let cost_efficiency =
            (1.0 - telemetry.cost_incurred / self.cost_benchmark).clamp(0.0, 1.0);
        let satisfaction = if success {
            (telemetry.confidence * latency_penalty).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let raw = (self.weight_satisfaction * satisfaction
            + self.weight_reliability * reliability
            + self.weight_latency_penalty * latency_penalty
            + self.weight_cost_efficiency * cost_efficiency)
            .clamp(0.0, 1.0);

        ObservationFactors {
            reliability,
            latency_penalty,
            cost_efficiency,
            satisfaction,
            raw,
        }
    }

    /// `(1 - α) * prior + α * raw`, always within `[min(prior, raw), max(prior, raw)]`.
    pub fn smooth(&self, prior: f64, raw: f64) -> f64 {
        let blended = (1.0 - self.alpha) * prior + self.alpha * raw;
        blended.clamp(prior.min(raw), prior.max(raw))
    }

    /// New score from the decayed prior and one observation.
    pub fn update(
        &self,
        prior: f64,
        telemetry: &Telemetry,
        base_error_rate: f64,
    ) -> (f64, ObservationFactors) {
        let factors = self.factors(telemetry, base_error_rate);
        (self.smooth(prior, factors.raw), factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::Outcome;
    use chrono::Utc;
    use proptest::prelude::*;
    use repscore_state::ProviderId;

    fn telemetry(outcome: Outcome, latency: f64, cost: f64, confidence: f64) -> Telemetry {
        Telemetry::new(
            ProviderId::from("p"),
            Utc::now(),
            outcome,
            latency,
            cost,
            confidence,
        )
    }

    fn updater() -> ScoreUpdater {
        ScoreUpdater::from_config(&RepScoreConfig::default())
    }

    #[test]
    fn test_fast_cheap_success_factors() {
        let f = updater().factors(&telemetry(Outcome::Success, 0.1, 0.002, 0.9), 0.15);
        assert_eq!(f.reliability, 1.0);
        assert!((f.latency_penalty - 0.875).abs() < 1e-12);
        assert!((f.cost_efficiency - 0.6).abs() < 1e-12);
        assert!((f.satisfaction - 0.7875).abs() < 1e-12);
        assert!((f.raw - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_failures_zero_satisfaction_and_reliability() {
        for outcome in [Outcome::Error, Outcome::Timeout] {
            let f = updater().factors(&telemetry(outcome, 0.1, 0.002, 0.9), 0.15);
            assert_eq!(f.satisfaction, 0.0);
            assert_eq!(f.reliability, 0.0);
        }
    }

    #[test]
    fn test_slow_expensive_success_clamps_to_zero() {
        let f = updater().factors(&telemetry(Outcome::Success, 5.0, 1.0, 1.0), 0.0);
        assert_eq!(f.latency_penalty, 0.0);
        assert_eq!(f.cost_efficiency, 0.0);
        assert_eq!(f.satisfaction, 0.0);
        assert!((f.raw - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_reliability_blend_uses_error_rate() {
        let config = RepScoreConfig {
            reliability_blend: 0.5,
            ..RepScoreConfig::default()
        };
        let u = ScoreUpdater::from_config(&config);
        let f = u.factors(&telemetry(Outcome::Error, 0.1, 0.0, 0.5), 0.2);
        assert!((f.reliability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_single_bad_event_moves_at_most_alpha() {
        let (next, _) = updater().update(0.9, &telemetry(Outcome::Error, 5.0, 1.0, 0.0), 0.0);
        assert!((next - 0.81).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_smoothing_stays_between_prior_and_raw(
            prior in 0.0f64..=1.0,
            latency in 0.0f64..5.0,
            cost in 0.0f64..0.02,
            confidence in 0.0f64..=1.0,
            success in any::<bool>(),
        ) {
            let outcome = if success { Outcome::Success } else { Outcome::Error };
            let (next, f) = updater().update(prior, &telemetry(outcome, latency, cost, confidence), 0.1);
            prop_assert!(next >= prior.min(f.raw) && next <= prior.max(f.raw));
            prop_assert!((0.0..=1.0).contains(&next));
        }
    }
}
