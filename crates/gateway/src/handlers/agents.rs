//! Agent roster handler

use axum::Json;
use lakesense_common::agents::{AgentDescriptor, AgentKind};
use serde::Serialize;

#[derive(Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentDescriptor>,
}

/// List every agent the orchestrator can route to
pub async fn list_agents() -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: AgentKind::catalog(),
    })
}
