//! Sparse-evidence damping applied before ranking.
//!
//! Never touches the stored score.

use crate::config::RepScoreConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceAdjuster {
    k: f64,
}

impl ConfidenceAdjuster {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    pub fn from_config(config: &RepScoreConfig) -> Self {
        Self::new(config.confidence_k)
    }

    /// `1 - e^(-k * n)`; zero evidence gives zero confidence.
    pub fn factor(&self, interaction_count: u64) -> f64 {
        1.0 - (-self.k * interaction_count as f64).exp()
    }

    pub fn adjusted(&self, score: f64, interaction_count: u64) -> f64 {
        score * self.factor(interaction_count)
    }

    /// `adjusted` when `conservative`, else `score` unchanged.
    pub fn apply(&self, score: f64, interaction_count: u64, conservative: bool) -> f64 {
        if conservative {
            self.adjusted(score, interaction_count)
        } else {
            score
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_factor_grows_with_evidence() {
        let adj = ConfidenceAdjuster::new(0.5);
        assert_eq!(adj.factor(0), 0.0);
        assert!(adj.factor(1) < adj.factor(5));
        assert!(adj.factor(50) > 0.999);
    }

    #[test]
    fn test_non_conservative_passes_through() {
        let adj = ConfidenceAdjuster::new(0.5);
        assert_eq!(adj.apply(0.8, 0, false), 0.8);
        assert_eq!(adj.apply(0.8, 0, true), 0.0);
    }

    proptest! {
        #[test]
        fn prop_zero_interactions_floor_is_zero(score in 0.0f64..=1.0, k in 0.01f64..10.0) {
            prop_assert_eq!(ConfidenceAdjuster::new(k).adjusted(score, 0), 0.0);
        }

        #[test]
        fn prop_adjusted_never_exceeds_score(score in 0.0f64..=1.0, n in 0u64..1000) {
            let a = ConfidenceAdjuster::new(0.5).adjusted(score, n);
            prop_assert!(a >= 0.0 && a <= score);
        }
    }
}
