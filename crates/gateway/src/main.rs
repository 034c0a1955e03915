//! LakeSense API Gateway
//!
//! HTTP surface for the data-lake assistant.
//! Handles:
//! - Query routing to the orchestrator
//! - Health and readiness probes
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use lakesense_common::{
    config::{AppConfig, ObservabilityConfig},
    llm::create_completion_service,
    metrics,
    tools::{SimulatedLake, ToolRegistry},
    Orchestrator,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use middleware::rate_limit::{rate_limit_middleware, RateLimit};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting LakeSense API Gateway v{}", lakesense_common::VERSION);

    // Initialize metrics
    init_metrics(&config.observability)?;

    // Simulated lake backing the tool adapters
    let lake = match config.retrieval.fixtures_path.as_deref() {
        Some(path) => SimulatedLake::from_json_file(path)?,
        None => SimulatedLake::seeded(),
    };
    info!(datasets = lake.len(), "Data lake ready");

    let tools = ToolRegistry::simulated(Arc::new(lake));
    let completion = create_completion_service(&config.completion)?;
    info!(
        provider = completion.provider(),
        model = completion.model_id(),
        "Completion service ready"
    );

    let root = tracing::info_span!("lakesense", service = %config.observability.service_name);
    let orchestrator = Orchestrator::new(&config, tools, completion, &root);

    let config = Arc::new(config);

    // Create app state
    let state = AppState {
        config: config.clone(),
        orchestrator: Arc::new(orchestrator),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.metrics_port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_completion_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::COMPLETION_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), metrics::LATENCY_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    metrics::register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Query endpoint, rate limited when enabled
    let mut query_routes = Router::new().route("/query", post(handlers::query::query));
    if state.config.rate_limit.enabled {
        let limit = RateLimit::from_config(&state.config.rate_limit);
        query_routes = query_routes.route_layer(axum::middleware::from_fn_with_state(limit, rate_limit_middleware));
    }

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Agent roster
        .route("/agents", get(handlers::agents::list_agents))
        .merge(query_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use lakesense_common::config::RateLimitConfig;
    use lakesense_common::llm::MockCompletionService;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(config: AppConfig) -> Router {
        let tools = ToolRegistry::simulated(Arc::new(SimulatedLake::seeded()));
        let orchestrator = Orchestrator::new(
            &config,
            tools,
            Arc::new(MockCompletionService::new()),
            &tracing::Span::none(),
        );

        create_router(AppState {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        })
    }

    fn app() -> Router {
        app_with(AppConfig::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = tokio_test::assert_ok!(
            app()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
        );

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_ready_reports_tools_and_model() {
        let response = app()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["tools"].as_array().unwrap().len(), 4);
        assert_eq!(body["checks"]["completion"]["provider"], "mock");
    }

    #[tokio::test]
    async fn test_agents_roster() {
        let response = app()
            .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        let names: Vec<&str> = body["agents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["lineage_agent", "quality_agent", "retriever_agent", "reasoning_agent"]);
    }

    #[tokio::test]
    async fn test_query_missing_field() {
        let response = app().oneshot(post_json("/query", json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Required field missing: query");
    }

    #[tokio::test]
    async fn test_query_rejects_empty_and_malformed() {
        let empty = app().oneshot(post_json("/query", json!({"query": ""}))).await.unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let malformed = Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().oneshot(malformed).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_last_updated() {
        let request = post_json(
            "/query",
            json!({"query": "When was sakila.actor dataset last updated?", "dataset": "sakila.actor"}),
        );
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let envelope = &body["response"];

        assert_eq!(envelope["confidence"], 0.92);
        assert_eq!(envelope["answer"]["agent"], "retriever");
        assert_eq!(envelope["provenance"]["agent"], "retriever_agent");
        assert_eq!(envelope["provenance"]["dataset"], "sakila.actor");
        assert!(envelope["provenance"]["evidence_sources"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s == "glue.sakila.actor.last_updated"));
    }

    #[tokio::test]
    async fn test_query_falls_back_to_reasoning() {
        let response = app()
            .oneshot(post_json("/query", json!({"query": "tell me a joke"})))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["response"]["answer"]["agent"], "reasoning");
        assert!(body["response"]["answer"]["result"]["raw_model_output"].is_string());
    }

    #[tokio::test]
    async fn test_query_rate_limited() {
        let config = AppConfig {
            rate_limit: RateLimitConfig {
                requests_per_second: 1,
                burst: 1,
                enabled: true,
            },
            ..AppConfig::default()
        };
        let app = app_with(config);

        let first = app
            .clone()
            .oneshot(post_json("/query", json!({"query": "Is table1 fresh?"})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(post_json("/query", json!({"query": "Is table1 fresh?"})))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // Probes are not limited
        let health = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
