//! Lazy exponential decay toward the neutral baseline.
//!
//! `decayed = baseline + (score - baseline) * 2^(-Δt / H)`
//!
//! Pure: readers call it on every access, the stored record is only
//! rewritten by the next feedback commit.

use chrono::{DateTime, Utc};
use repscore_state::ReputationRecord;

use crate::config::RepScoreConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayEngine {
    baseline: f64,
    half_life_secs: f64,
}

impl DecayEngine {
    pub fn new(baseline: f64, half_life_secs: f64) -> Self {
        Self {
            baseline,
            half_life_secs,
        }
    }

    pub fn from_config(config: &RepScoreConfig) -> Self {
        Self::new(config.default_initial_score, config.half_life_secs())
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Live score of `record` at `now`. A clock that went backwards means no
    /// decay.
    pub fn decayed(&self, record: &ReputationRecord, now: DateTime<Utc>) -> f64 {
        let elapsed_ms = (now - record.last_updated_at).num_milliseconds().max(0);
        self.decay_score(record.score, elapsed_ms as f64 / 1000.0)
    }

    /// Decay `score` over `elapsed_secs`.
    pub fn decay_score(&self, score: f64, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return score;
        }
        let remaining = (-elapsed_secs / self.half_life_secs).exp2();
        (self.baseline + (score - self.baseline) * remaining).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use repscore_state::ProviderId;

    fn engine() -> DecayEngine {
        DecayEngine::from_config(&RepScoreConfig::default())
    }

    fn record(score: f64, at: DateTime<Utc>) -> ReputationRecord {
        ReputationRecord::new(ProviderId::from("p"), score, at)
    }

    #[test]
    fn test_no_elapsed_time_returns_stored_score() {
        let t = Utc::now();
        assert_eq!(engine().decayed(&record(0.9, t), t), 0.9);
    }

    #[test]
    fn test_one_half_life_halves_the_gap() {
        let t0 = Utc::now();
        let live = engine().decayed(&record(0.9, t0), t0 + Duration::hours(24));
        assert!((live - 0.7).abs() < 1e-12, "got {live}");
    }

    #[test]
    fn test_clock_going_backwards_does_not_decay() {
        let t0 = Utc::now();
        let live = engine().decayed(&record(0.2, t0), t0 - Duration::hours(5));
        assert_eq!(live, 0.2);
    }

    #[test]
    fn test_below_baseline_scores_recover_toward_baseline() {
        let t0 = Utc::now();
        let live = engine().decayed(&record(0.1, t0), t0 + Duration::hours(48));
        assert!((live - 0.4).abs() < 1e-12, "got {live}");
    }

    proptest! {
        #[test]
        fn prop_decay_is_idempotent(score in 0.0f64..=1.0, secs in 0i64..10_000_000) {
            let t0 = Utc::now();
            let r = record(score, t0);
            let now = t0 + Duration::seconds(secs);
            prop_assert_eq!(engine().decayed(&r, now), engine().decayed(&r, now));
        }

        #[test]
        fn prop_decay_converges_without_overshoot(
            score in 0.0f64..=1.0,
            a in 0.0f64..1_000_000.0,
            extra in 1.0f64..1_000_000.0,
        ) {
            let e = engine();
            let base = e.baseline();
            let earlier = e.decay_score(score, a);
            let later = e.decay_score(score, a + extra);
            prop_assert!((later - base).abs() <= (earlier - base).abs());
            // never crosses the baseline
            prop_assert!((later - base) * (score - base) >= 0.0);
            prop_assert!((0.0..=1.0).contains(&later));
        }
    }
}
