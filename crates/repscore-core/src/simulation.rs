//! Seeded stand-in for real task execution.
//!
//! Each simulated provider draws latency from `|N(avg_latency, 0.05)|`,
//! uses 50..=150 compute units, and fails with its configured error rate.
//! The generator is injected so runs are reproducible.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use repscore_state::ProviderId;
use serde::Serialize;

use crate::domain::error::{RepScoreError, Result};
use crate::domain::provider::{Provider, ProviderRegistry};
use crate::domain::telemetry::{Outcome, Telemetry};

const LATENCY_STD_DEV: f64 = 0.05;
const FAILURE_CONFIDENCE: f64 = 0.2;

/// What one simulated execution produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub latency_seconds: f64,
    pub compute_units: u32,
    pub cost_per_unit: f64,
    pub total_cost: f64,
    pub confidence: f64,
}

impl ExecutionResult {
    /// Telemetry stamped at completion (`started_at + latency`). The
    /// per-unit price is reported as the incurred cost.
    pub fn to_telemetry(&self, provider_id: ProviderId, started_at: DateTime<Utc>) -> Telemetry {
        let elapsed = Duration::milliseconds((self.latency_seconds * 1000.0).round() as i64);
        Telemetry::new(
            provider_id,
            started_at + elapsed,
            self.outcome,
            self.latency_seconds,
            self.cost_per_unit,
            self.confidence,
        )
    }
}

/// Anything that can run a task against a provider and report back.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, provider_id: &ProviderId) -> Result<ExecutionResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedProvider {
    pub id: ProviderId,
    pub error_rate: f64,
    pub avg_latency: f64,
    pub cost_per_unit: f64,
    pub timeout_secs: f64,
}

impl SimulatedProvider {
    pub fn from_provider(provider: &Provider, timeout_secs: f64) -> Self {
        Self {
            id: provider.id.clone(),
            error_rate: provider.base_error_rate,
            avg_latency: provider.base_avg_latency,
            cost_per_unit: provider.cost_per_unit,
            timeout_secs,
        }
    }

    pub fn run(&self, rng: &mut impl Rng) -> ExecutionResult {
        let latency = gaussian(rng, self.avg_latency, LATENCY_STD_DEV).abs();
        let compute_units: u32 = rng.gen_range(50..=150);
        let total_cost = f64::from(compute_units) * self.cost_per_unit;
        let failed = rng.gen_bool(self.error_rate.clamp(0.0, 1.0));

        let (outcome, latency_seconds, confidence) = if latency > self.timeout_secs {
            (Outcome::Timeout, self.timeout_secs, 0.0)
        } else if failed {
            (Outcome::Error, latency, FAILURE_CONFIDENCE)
        } else {
            (Outcome::Success, latency, rng.gen_range(0.75..=0.99))
        };

        ExecutionResult {
            outcome,
            latency_seconds,
            compute_units,
            cost_per_unit: self.cost_per_unit,
            total_cost,
            confidence,
        }
    }
}

/// Box–Muller transform over two uniforms.
fn gaussian(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Executor over every provider in a registry, sharing one seeded generator.
pub struct SimulatedExecutor {
    providers: BTreeMap<ProviderId, SimulatedProvider>,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(registry: &ProviderRegistry, timeout_secs: f64, seed: u64) -> Self {
        Self::with_rng(registry, timeout_secs, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(registry: &ProviderRegistry, timeout_secs: f64, rng: StdRng) -> Self {
        let providers = registry
            .iter()
            .map(|p| (p.id.clone(), SimulatedProvider::from_provider(p, timeout_secs)))
            .collect();
        Self {
            providers,
            rng: Mutex::new(rng),
        }
    }

    /// Change a provider's behaviour, e.g. to force a run of failures.
    pub fn override_behaviour(
        &mut self,
        provider_id: &ProviderId,
        apply: impl FnOnce(&mut SimulatedProvider),
    ) -> Result<()> {
        let provider =
            self.providers
                .get_mut(provider_id)
                .ok_or_else(|| RepScoreError::UnknownProvider {
                    provider_id: provider_id.to_string(),
                })?;
        apply(provider);
        Ok(())
    }

    pub fn provider(&self, provider_id: &ProviderId) -> Option<&SimulatedProvider> {
        self.providers.get(provider_id)
    }
}

impl TaskExecutor for SimulatedExecutor {
    fn execute(&self, provider_id: &ProviderId) -> Result<ExecutionResult> {
        let provider =
            self.providers
                .get(provider_id)
                .ok_or_else(|| RepScoreError::UnknownProvider {
                    provider_id: provider_id.to_string(),
                })?;
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Ok(provider.run(&mut *rng))
    }
}
