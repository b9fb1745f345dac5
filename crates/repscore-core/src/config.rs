//! Reputation policy configuration.
//!
//! Loaded from TOML (snake_case keys, or the upper-case option names as
//! aliases) and optionally overridden by `REPSCORE_<OPTION>` environment
//! variables. [`RepScoreConfig::validate`] runs before any component is
//! built; an invalid config refuses to start.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{RepScoreError, Result};
use crate::domain::goal::Level;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;
const ENV_PREFIX: &str = "REPSCORE_";

/// When ranking should use confidence-adjusted scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    Never,
    /// Only for goals with `risk_tolerance = low`.
    #[default]
    LowRiskOnly,
    Always,
}

impl ConfidenceMode {
    pub fn applies_to(&self, risk_tolerance: Level) -> bool {
        match self {
            ConfidenceMode::Never => false,
            ConfidenceMode::LowRiskOnly => risk_tolerance == Level::Low,
            ConfidenceMode::Always => true,
        }
    }
}

impl std::str::FromStr for ConfidenceMode {
    type Err = RepScoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(ConfidenceMode::Never),
            "low_risk_only" => Ok(ConfidenceMode::LowRiskOnly),
            "always" => Ok(ConfidenceMode::Always),
            other => Err(RepScoreError::config(
                "confidence_mode",
                format!("unrecognized value {other:?}"),
            )),
        }
    }
}

/// Minimum live score per risk tolerance. Medium uses
/// [`RepScoreConfig::min_reputation_threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.85,
            high: 0.50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepScoreConfig {
    // Observation factor weights; must sum to 1.
    #[serde(alias = "WEIGHT_SATISFACTION")]
    pub weight_satisfaction: f64,
    #[serde(alias = "WEIGHT_RELIABILITY")]
    pub weight_reliability: f64,
    #[serde(alias = "WEIGHT_LATENCY_PENALTY")]
    pub weight_latency_penalty: f64,
    #[serde(alias = "WEIGHT_COST_EFFICIENCY")]
    pub weight_cost_efficiency: f64,

    #[serde(alias = "MIN_REPUTATION_THRESHOLD")]
    pub min_reputation_threshold: f64,
    #[serde(alias = "ALPHA_SMOOTHING")]
    pub alpha_smoothing: f64,
    /// Seconds.
    #[serde(alias = "MAX_ACCEPTABLE_LATENCY")]
    pub max_acceptable_latency: f64,
    #[serde(alias = "COST_BENCHMARK")]
    pub cost_benchmark: f64,
    /// Neutral baseline that idle scores decay toward.
    #[serde(alias = "DEFAULT_INITIAL_SCORE")]
    pub default_initial_score: f64,
    #[serde(alias = "REPUTATION_DECAY_HALF_LIFE_HOURS")]
    pub reputation_decay_half_life_hours: f64,

    /// Share of the reliability factor taken from `1 - base_error_rate`
    /// instead of the binary outcome. 0 keeps reliability binary.
    pub reliability_blend: f64,
    /// k in `1 - e^(-k * interaction_count)`.
    pub confidence_k: f64,
    pub confidence_mode: ConfidenceMode,
    pub risk_thresholds: RiskThresholds,
    /// Decay drops larger than this are logged.
    pub decay_warning_delta: f64,
    /// Telemetry entries kept per provider in the snapshot file.
    pub telemetry_log_capacity: usize,
    /// Simulated executions slower than this are reported as timeouts.
    pub execution_timeout_secs: f64,
}

impl Default for RepScoreConfig {
    fn default() -> Self {
        Self {
            weight_satisfaction: 0.40,
            weight_reliability: 0.30,
            weight_latency_penalty: 0.20,
            weight_cost_efficiency: 0.10,
            min_reputation_threshold: 0.70,
            alpha_smoothing: 0.1,
            max_acceptable_latency: 0.8,
            cost_benchmark: 0.005,
            default_initial_score: 0.50,
            reputation_decay_half_life_hours: 24.0,
            reliability_blend: 0.0,
            confidence_k: 0.5,
            confidence_mode: ConfidenceMode::LowRiskOnly,
            risk_thresholds: RiskThresholds::default(),
            decay_warning_delta: 0.001,
            telemetry_log_capacity: 50,
            execution_timeout_secs: 2.0,
        }
    }
}

impl RepScoreConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| RepScoreError::config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `REPSCORE_<OPTION>` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(std::env::vars().filter_map(|(k, v)| {
            k.strip_prefix(ENV_PREFIX).map(|option| (option.to_string(), v))
        }))
    }

    /// Apply `(OPTION, value)` overrides, then validate.
    ///
    /// Option names are the upper-case configuration keys without prefix,
    /// e.g. `ALPHA_SMOOTHING`. Unknown names are ignored; unparsable values
    /// are configuration errors.
    pub fn with_overrides<I>(mut self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (option, value) in overrides {
            let option = option.to_ascii_uppercase();
            let slot: &mut f64 = match option.as_str() {
                "WEIGHT_SATISFACTION" => &mut self.weight_satisfaction,
                "WEIGHT_RELIABILITY" => &mut self.weight_reliability,
                "WEIGHT_LATENCY_PENALTY" => &mut self.weight_latency_penalty,
                "WEIGHT_COST_EFFICIENCY" => &mut self.weight_cost_efficiency,
                "MIN_REPUTATION_THRESHOLD" => &mut self.min_reputation_threshold,
                "ALPHA_SMOOTHING" => &mut self.alpha_smoothing,
                "MAX_ACCEPTABLE_LATENCY" => &mut self.max_acceptable_latency,
                "COST_BENCHMARK" => &mut self.cost_benchmark,
                "DEFAULT_INITIAL_SCORE" => &mut self.default_initial_score,
                "REPUTATION_DECAY_HALF_LIFE_HOURS" => &mut self.reputation_decay_half_life_hours,
                "RELIABILITY_BLEND" => &mut self.reliability_blend,
                "CONFIDENCE_K" => &mut self.confidence_k,
                "EXECUTION_TIMEOUT_SECS" => &mut self.execution_timeout_secs,
                "CONFIDENCE_MODE" => {
                    self.confidence_mode = value.parse()?;
                    continue;
                }
                "TELEMETRY_LOG_CAPACITY" => {
                    self.telemetry_log_capacity = value.trim().parse().map_err(|_| {
                        RepScoreError::config(&option, format!("{value:?} is not an integer"))
                    })?;
                    continue;
                }
                _ => continue,
            };
            *slot = value
                .trim()
                .parse()
                .map_err(|_| RepScoreError::config(&option, format!("{value:?} is not a number")))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Fail fast on any inconsistent setting.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("weight_satisfaction", self.weight_satisfaction),
            ("weight_reliability", self.weight_reliability),
            ("weight_latency_penalty", self.weight_latency_penalty),
            ("weight_cost_efficiency", self.weight_cost_efficiency),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(RepScoreError::config(name, format!("{w} must be >= 0")));
            }
        }
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RepScoreError::config(
                "factor weights",
                format!("sum to {sum}, expected 1.0"),
            ));
        }

        if !(self.alpha_smoothing > 0.0 && self.alpha_smoothing <= 1.0) {
            return Err(RepScoreError::config(
                "alpha_smoothing",
                format!("{} outside (0, 1]", self.alpha_smoothing),
            ));
        }
        for (name, v) in [
            ("max_acceptable_latency", self.max_acceptable_latency),
            ("cost_benchmark", self.cost_benchmark),
            ("reputation_decay_half_life_hours", self.reputation_decay_half_life_hours),
            ("confidence_k", self.confidence_k),
            ("execution_timeout_secs", self.execution_timeout_secs),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(RepScoreError::config(name, format!("{v} must be > 0")));
            }
        }
        for (name, v) in [
            ("min_reputation_threshold", self.min_reputation_threshold),
            ("default_initial_score", self.default_initial_score),
            ("reliability_blend", self.reliability_blend),
            ("risk_thresholds.low", self.risk_thresholds.low),
            ("risk_thresholds.high", self.risk_thresholds.high),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(RepScoreError::config(name, format!("{v} outside [0, 1]")));
            }
        }
        if !(self.decay_warning_delta.is_finite() && self.decay_warning_delta >= 0.0) {
            return Err(RepScoreError::config("decay_warning_delta", "must be >= 0"));
        }
        if self.telemetry_log_capacity == 0 {
            return Err(RepScoreError::config("telemetry_log_capacity", "must be >= 1"));
        }
        Ok(())
    }

    /// Routing threshold for a risk tolerance.
    pub fn threshold_for(&self, risk_tolerance: Level) -> f64 {
        match risk_tolerance {
            Level::Low => self.risk_thresholds.low,
            Level::Medium => self.min_reputation_threshold,
            Level::High => self.risk_thresholds.high,
        }
    }

    pub fn half_life_secs(&self) -> f64 {
        self.reputation_decay_half_life_hours * 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        RepScoreConfig::default().validate().unwrap();
    }

    #[test]
    fn test_unnormalized_weights_refuse_to_start() {
        let config = RepScoreConfig {
            weight_satisfaction: 0.5,
            ..RepScoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("factor weights"));
    }

    #[test]
    fn test_negative_weight_rejected_even_if_sum_is_one() {
        let config = RepScoreConfig {
            weight_satisfaction: 0.6,
            weight_cost_efficiency: -0.1,
            ..RepScoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_constants_rejected() {
        for config in [
            RepScoreConfig {
                cost_benchmark: 0.0,
                ..RepScoreConfig::default()
            },
            RepScoreConfig {
                max_acceptable_latency: -1.0,
                ..RepScoreConfig::default()
            },
            RepScoreConfig {
                reputation_decay_half_life_hours: 0.0,
                ..RepScoreConfig::default()
            },
            RepScoreConfig {
                alpha_smoothing: 0.0,
                ..RepScoreConfig::default()
            },
        ] {
            assert!(matches!(
                config.validate(),
                Err(RepScoreError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_toml_accepts_upper_case_option_names() {
        let config = RepScoreConfig::from_toml_str(
            r#"
            ALPHA_SMOOTHING = 0.2
            MIN_REPUTATION_THRESHOLD = 0.75
            confidence_mode = "always"
            "#,
        )
        .unwrap();
        assert_eq!(config.alpha_smoothing, 0.2);
        assert_eq!(config.min_reputation_threshold, 0.75);
        assert_eq!(config.confidence_mode, ConfidenceMode::Always);
        assert_eq!(config.weight_satisfaction, 0.40);
    }

    #[test]
    fn test_toml_with_bad_weights_fails() {
        let err = RepScoreConfig::from_toml_str("weight_reliability = 0.9").unwrap_err();
        assert!(matches!(err, RepScoreError::Configuration { .. }));
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let config = RepScoreConfig::default()
            .with_overrides(overrides(&[
                ("ALPHA_SMOOTHING", "0.25"),
                ("confidence_mode", "never"),
                ("UNRELATED", "x"),
            ]))
            .unwrap();
        assert_eq!(config.alpha_smoothing, 0.25);
        assert_eq!(config.confidence_mode, ConfidenceMode::Never);
    }

    #[test]
    fn test_unparsable_override_is_configuration_error() {
        let err = RepScoreConfig::default()
            .with_overrides(overrides(&[("COST_BENCHMARK", "cheap")]))
            .unwrap_err();
        assert!(err.to_string().contains("COST_BENCHMARK"));
    }

    #[test]
    fn test_thresholds_by_risk() {
        let config = RepScoreConfig::default();
        assert_eq!(config.threshold_for(Level::Low), 0.85);
        assert_eq!(config.threshold_for(Level::Medium), 0.70);
        assert_eq!(config.threshold_for(Level::High), 0.50);
    }
}
