//! Concurrent routing reads and feedback writes against one service.

use std::sync::Arc;

use chrono::{Duration, Utc};
use repscore_core::{
    AgentClient, Category, GoalDescriptor, Outcome, ProviderId, ProviderRegistry,
    RepScoreConfig, RepScoreService, SimulatedExecutor, Telemetry,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_feedback_loses_no_updates() {
    let t0 = Utc::now();
    let svc = Arc::new(
        RepScoreService::new(
            RepScoreConfig::default(),
            ProviderRegistry::reference_catalog(),
            t0,
        )
        .await
        .unwrap(),
    );
    let targets = ["compute_server_1", "data_server_2", "semantic_db_6"];

    let mut handles = Vec::new();
    for worker in 0..8i64 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25i64 {
                let id = ProviderId::from(targets[(i as usize) % targets.len()]);
                let at = t0 + Duration::milliseconds(worker * 1_000 + i);
                let t = Telemetry::new(id.clone(), at, Outcome::Success, 0.1, 0.002, 0.9);
                svc.submit_feedback(&id, &t).await.unwrap();
                // interleave reads
                let _ = svc
                    .route(Category::MathCompute, GoalDescriptor::default(), at)
                    .await;
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let audit = svc.audit(t0 + Duration::seconds(10)).await.unwrap();
    let count = |id: &str| {
        audit
            .iter()
            .find(|e| e.provider_id.as_str() == id)
            .unwrap()
            .interaction_count
    };
    // 25 submissions per worker spread round-robin over three providers
    assert_eq!(count("compute_server_1"), 8 * 9);
    assert_eq!(count("data_server_2"), 8 * 8);
    assert_eq!(count("semantic_db_6"), 8 * 8);
    assert_eq!(count("image_fast_4"), 0);
    assert_eq!(svc.metrics().feedback_committed(), 200);
    for entry in &audit {
        assert!((0.0..=1.0).contains(&entry.stored_score));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simulated_agents_share_one_service() {
    let registry = ProviderRegistry::reference_catalog();
    let executor = Arc::new(SimulatedExecutor::new(&registry, 2.0, 2024));
    let svc = Arc::new(
        RepScoreService::new(RepScoreConfig::default(), registry, Utc::now())
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = AgentClient::new(svc.clone(), executor.clone());
        handles.push(tokio::spawn(async move {
            let mut completed = 0u64;
            for _ in 0..10 {
                if client
                    .execute_task(Category::DataRetrieval, GoalDescriptor::default(), Utc::now())
                    .await
                    .is_ok()
                {
                    completed += 1;
                }
            }
            completed
        }));
    }
    let mut completed = 0;
    for h in handles {
        completed += h.await.unwrap();
    }

    let record = svc
        .audit(Utc::now())
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.provider_id.as_str() == "data_server_2")
        .unwrap();
    assert_eq!(record.interaction_count, completed);
    assert_eq!(svc.metrics().feedback_committed(), completed);
}
