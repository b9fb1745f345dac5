//! Table-driven goal → selection weight mapping.
//!
//! | level  | threshold (risk)          | priority shift |
//! |--------|---------------------------|----------------|
//! | low    | `risk_thresholds.low`     | -0.1           |
//! | medium | `min_reputation_threshold`|  0.0           |
//! | high   | `risk_thresholds.high`    | +0.1           |
//!
//! α is fixed at 0.5; accuracy priority moves weight from γ to β and latency
//! priority moves it back.

use crate::config::{ConfidenceMode, RepScoreConfig};
use crate::domain::goal::{GoalDescriptor, Level, PolicyWeights};

const BASE_REPUTATION: f64 = 0.5;
const BASE_ACCURACY: f64 = 0.25;
const BASE_LATENCY: f64 = 0.25;
const PRIORITY_STEP: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct GoalPolicyMapper {
    threshold_low: f64,
    threshold_medium: f64,
    threshold_high: f64,
    confidence_mode: ConfidenceMode,
}

impl GoalPolicyMapper {
    pub fn from_config(config: &RepScoreConfig) -> Self {
        Self {
            threshold_low: config.threshold_for(Level::Low),
            threshold_medium: config.threshold_for(Level::Medium),
            threshold_high: config.threshold_for(Level::High),
            confidence_mode: config.confidence_mode,
        }
    }

    pub fn map_goal(&self, goal: &GoalDescriptor) -> PolicyWeights {
        let min_reputation = match goal.risk_tolerance {
            Level::Low => self.threshold_low,
            Level::Medium => self.threshold_medium,
            Level::High => self.threshold_high,
        };

        let acc = shift(goal.accuracy_priority);
        let lat = shift(goal.latency_priority);
        let alpha = BASE_REPUTATION;
        let beta = (BASE_ACCURACY + acc - lat).max(0.0);
        let gamma = (BASE_LATENCY + lat - acc).max(0.0);
        let total = alpha + beta + gamma;

        PolicyWeights {
            min_reputation,
            weight_reputation: alpha / total,
            weight_accuracy: beta / total,
            weight_latency: gamma / total,
            conservative: self.confidence_mode.applies_to(goal.risk_tolerance),
        }
    }
}

fn shift(level: Level) -> f64 {
    match level {
        Level::Low => -PRIORITY_STEP,
        Level::Medium => 0.0,
        Level::High => PRIORITY_STEP,
    }
}
