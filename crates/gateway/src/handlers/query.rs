//! Query handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use lakesense_common::{
    agents::ResponseEnvelope,
    errors::{AppError, Result},
    metrics::RequestMetrics,
};

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: Option<String>,

    /// Dataset resolved upstream; the configured default when absent
    #[validate(length(min = 1, max = 256))]
    pub dataset: Option<String>,
}

/// Query response
#[derive(Serialize)]
pub struct QueryResponse {
    pub response: ResponseEnvelope,
}

/// Answer a data-lake question
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let metrics = RequestMetrics::start("POST", "/query");

    let result = answer(&state, payload).await;
    let status = match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    };
    metrics.finish(status);

    result
}

async fn answer(
    state: &AppState,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidFormat {
        message: e.body_text(),
    })?;

    let query = request.query.as_deref().ok_or_else(|| AppError::MissingField {
        field: "query".to_string(),
    })?;

    request.validate().map_err(|e| AppError::Validation {
        field: e.field_errors().keys().next().map(|field| field.to_string()),
        message: e.to_string(),
    })?;

    let target = match request.dataset.as_deref() {
        Some(dataset) => state.orchestrator.default_target().with_dataset(dataset),
        None => state.orchestrator.default_target().clone(),
    };

    let timeout = state.config.request_timeout();
    let envelope = tokio::time::timeout(timeout, state.orchestrator.process_for(query, &target))
        .await
        .map_err(|_| AppError::ServiceUnavailable {
            message: format!("query timed out after {}s", timeout.as_secs()),
        })?;

    Ok(Json(QueryResponse { response: envelope }))
}
