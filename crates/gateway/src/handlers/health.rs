//! Health check handlers

use axum::{extract::State, Json};
use lakesense_common::agents::ToolProbe;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub tools: Vec<ToolProbe>,
    pub completion: CompletionCheck,
}

#[derive(Serialize)]
pub struct CompletionCheck {
    pub provider: String,
    pub model: String,
}

/// Liveness probe - always returns ok if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe - queries every tool adapter against the default dataset
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let tools = state.orchestrator.retriever().probe().await;
    let all_up = tools.iter().all(|probe| probe.status == "up");

    if !all_up {
        tracing::warn!(
            down = tools.iter().filter(|p| p.status != "up").count(),
            "Readiness check found unavailable tools"
        );
    }

    let reasoner = state.orchestrator.reasoner();

    Json(ReadyResponse {
        status: if all_up { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            tools,
            completion: CompletionCheck {
                provider: reasoner.provider().to_string(),
                model: reasoner.model_id().to_string(),
            },
        },
    })
}
