//! RepScore Core Library
//!
//! Reputation scoring, lazy time decay, and goal-conditioned provider
//! routing on top of `repscore-state`.
//!
//! Read path: [`GoalPolicyMapper`] → [`DiscoveryFilter`] → [`SelectionPolicy`].
//! Write path: [`FeedbackPipeline`] → [`ScoreUpdater`] → store commit.
//! [`RepScoreService`] wires both paths over one shared store.

pub mod agent;
pub mod confidence;
pub mod config;
pub mod decay;
pub mod discovery;
pub mod domain;
pub mod explain;
pub mod feedback;
pub mod goal_policy;
pub mod metrics;
pub mod obs;
pub mod scoring;
pub mod selection;
pub mod service;
pub mod simulation;
pub mod telemetry;

pub use domain::{
    Category, GoalDescriptor, Level, Outcome, PolicyWeights, Provider, ProviderRegistry,
    RepScoreError, Result, Telemetry,
};

pub use repscore_state::{
    JsonSnapshotFile, MemoryReputationStore, ProviderId, ReputationRecord, ReputationStore,
    SnapshotPersister,
};

pub use agent::{AgentClient, TaskReport};
pub use confidence::ConfidenceAdjuster;
pub use config::{ConfidenceMode, RepScoreConfig, RiskThresholds};
pub use decay::DecayEngine;
pub use discovery::{Candidate, DiscoveryFilter};
pub use explain::{render_recommendation, render_weights};
pub use feedback::{FeedbackPipeline, FeedbackReceipt};
pub use goal_policy::GoalPolicyMapper;
pub use scoring::{ObservationFactors, ScoreUpdater};
pub use selection::{RankedCandidate, Selection, SelectionPolicy};
pub use service::{AuditEntry, RepScoreService, RouteDecision};
pub use simulation::{ExecutionResult, SimulatedExecutor, SimulatedProvider, TaskExecutor};

pub use metrics::Metrics;
pub use obs::{
    emit_feedback_committed, emit_feedback_rejected, emit_persist_failed,
    emit_reputation_decayed, emit_route_blocked, emit_route_selected, route_span,
};
pub use telemetry::init_tracing;

/// RepScore version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
