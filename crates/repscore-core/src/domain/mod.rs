//! Domain models for RepScore.
//!
//! Canonical definitions for the core entities:
//! - `Provider` / `ProviderRegistry`: immutable catalog of service providers
//! - `Telemetry`: observed outcome of one task execution
//! - `GoalDescriptor` / `PolicyWeights`: caller goals and derived coefficients
//! - `RepScoreError`: error taxonomy surfaced to callers

pub mod category;
pub mod error;
pub mod goal;
pub mod provider;
pub mod telemetry;

// Re-export main types and errors
pub use category::Category;
pub use error::{RepScoreError, Result};
pub use goal::{GoalDescriptor, Level, PolicyWeights};
pub use provider::{Provider, ProviderRegistry};
pub use telemetry::{Outcome, Telemetry};
