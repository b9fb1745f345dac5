//! Structured observability hooks for routing and feedback events.
//!
//! This module provides:
//! - Request-scoped tracing spans via [`route_span`]
//! - Emission functions for routing decisions, feedback commits, decay and persistence
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the CLI.

use repscore_state::ProviderId;
use tracing::{debug, info, warn};

use crate::domain::category::Category;

/// Request-scoped span tagged with the requested category.
///
/// Attach it to the routing future with `tracing::Instrument`; an entered
/// span guard is not `Send` and cannot be held across an `.await`.
///
/// # Example
///
/// ```ignore
/// async { /* ... */ }.instrument(route_span(Category::ImageGen)).await;
/// // every event inside carries category = IMAGE_GEN
/// ```
pub fn route_span(category: Category) -> tracing::Span {
    tracing::info_span!("repscore.route", category = %category)
}

/// Emit event: a provider was selected for a route request.
pub fn emit_route_selected(
    category: Category,
    provider_id: &ProviderId,
    policy_score: f64,
    live_score: f64,
) {
    info!(
        event = "route.selected",
        category = %category,
        provider_id = %provider_id,
        policy_score = policy_score,
        live_score = live_score,
    );
}

/// Emit event: no candidate met the goal threshold.
pub fn emit_route_blocked(category: Category, threshold: f64, considered: usize) {
    info!(
        event = "route.blocked",
        category = %category,
        threshold = threshold,
        considered = considered,
    );
}

/// Emit event: feedback was committed to the store.
pub fn emit_feedback_committed(
    provider_id: &ProviderId,
    prior_score: f64,
    new_score: f64,
    interaction_count: u64,
) {
    info!(
        event = "feedback.committed",
        provider_id = %provider_id,
        prior_score = prior_score,
        new_score = new_score,
        interaction_count = interaction_count,
    );
}

/// Emit event: feedback was rejected before reaching the store (warning level).
pub fn emit_feedback_rejected(provider_id: &ProviderId, error: &dyn std::fmt::Display) {
    warn!(event = "feedback.rejected", provider_id = %provider_id, error = %error);
}

/// Emit event: a read observed a decayed score (debug level).
pub fn emit_reputation_decayed(provider_id: &ProviderId, stored: f64, live: f64) {
    debug!(
        event = "reputation.decayed",
        provider_id = %provider_id,
        stored = stored,
        live = live,
    );
}

/// Emit event: the durable snapshot could not be queued (warning level).
pub fn emit_persist_failed(provider_id: &ProviderId, error: &dyn std::fmt::Display) {
    warn!(event = "persist.failed", provider_id = %provider_id, error = %error);
}
