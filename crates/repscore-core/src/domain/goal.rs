//! Caller goals and the selection weights derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::RepScoreError;

/// Three-step priority scale used by every goal dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = RepScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            other => Err(RepScoreError::config(
                "goal level",
                format!("unrecognized value {other:?} (expected low, medium or high)"),
            )),
        }
    }
}

/// Per-request routing goal supplied by the agent. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalDescriptor {
    pub risk_tolerance: Level,
    pub latency_priority: Level,
    pub accuracy_priority: Level,
}

impl GoalDescriptor {
    pub fn new(risk_tolerance: Level, latency_priority: Level, accuracy_priority: Level) -> Self {
        Self {
            risk_tolerance,
            latency_priority,
            accuracy_priority,
        }
    }

    /// Parse the three dimensions from strings; any unknown value is an error.
    pub fn parse(risk: &str, latency: &str, accuracy: &str) -> Result<Self, RepScoreError> {
        Ok(Self::new(risk.parse()?, latency.parse()?, accuracy.parse()?))
    }
}

/// Selection coefficients produced by the goal policy mapper.
///
/// `weight_reputation + weight_accuracy + weight_latency == 1`, all
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyWeights {
    pub min_reputation: f64,
    /// α
    pub weight_reputation: f64,
    /// β
    pub weight_accuracy: f64,
    /// γ
    pub weight_latency: f64,
    /// Rank on confidence-adjusted scores instead of raw live scores.
    pub conservative: bool,
}

impl PolicyWeights {
    pub fn sum(&self) -> f64 {
        self.weight_reputation + self.weight_accuracy + self.weight_latency
    }
}
