//! Agent-side task loop: route → execute → report → feedback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repscore_state::ProviderId;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::category::Category;
use crate::domain::error::Result;
use crate::domain::goal::GoalDescriptor;
use crate::domain::telemetry::Outcome;
use crate::explain;
use crate::feedback::FeedbackReceipt;
use crate::service::RepScoreService;
use crate::simulation::{ExecutionResult, TaskExecutor};

/// Everything that happened for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: Uuid,
    pub category: Category,
    pub provider_id: ProviderId,
    pub recommendation: String,
    pub execution: ExecutionResult,
    pub feedback: FeedbackReceipt,
}

impl TaskReport {
    pub fn outcome(&self) -> Outcome {
        self.execution.outcome
    }
}

#[derive(Clone)]
pub struct AgentClient {
    service: Arc<RepScoreService>,
    executor: Arc<dyn TaskExecutor>,
}

impl AgentClient {
    pub fn new(service: Arc<RepScoreService>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self { service, executor }
    }

    pub fn service(&self) -> &RepScoreService {
        &self.service
    }

    /// Run one task end to end.
    ///
    /// A blocked route returns `NoEligibleProvider` and nothing executes.
    /// Provider-side failures are not errors; they come back in the report
    /// and have already lowered the provider's score.
    pub async fn execute_task(
        &self,
        category: Category,
        goal: GoalDescriptor,
        now: DateTime<Utc>,
    ) -> Result<TaskReport> {
        let decision = self.service.route(category, goal, now).await?;
        let recommendation =
            explain::render_recommendation(decision.selection.ranking(), self.service.config());

        let execution = self.executor.execute(&decision.provider_id)?;
        let telemetry = execution.to_telemetry(decision.provider_id.clone(), now);
        let feedback = self
            .service
            .submit_feedback(&decision.provider_id, &telemetry)
            .await?;

        Ok(TaskReport {
            task_id: telemetry.transaction_id,
            category,
            provider_id: decision.provider_id,
            recommendation,
            execution,
            feedback,
        })
    }
}
