//! Retriever - gathers evidence from the tools a query routes to
//!
//! Tool calls run concurrently; evidence is concatenated in routing order
//! regardless of completion order. A failing tool (error, timeout or panic)
//! contributes nothing and never aborts the aggregation.

use super::evidence::{normalize, EvidenceList};
use super::router::{IntentRouter, RoutingDecision};
use crate::metrics;
use crate::tools::{Capability, Target, ToolRegistry, ToolResult};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span};

/// A tool call that contributed no evidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolFailure {
    pub capability: Capability,
    pub source: String,
    pub message: String,
}

/// Result of one gathering pass
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub decision: RoutingDecision,
    pub evidence: EvidenceList,
    pub failures: Vec<ToolFailure>,
}

/// Liveness of one tool adapter
#[derive(Debug, Clone, Serialize)]
pub struct ToolProbe {
    pub capability: Capability,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Retriever {
    router: Arc<IntentRouter>,
    tools: ToolRegistry,
    default_target: Target,
    tool_timeout: Duration,
    span: Span,
}

impl Retriever {
    pub fn new(
        router: Arc<IntentRouter>,
        tools: ToolRegistry,
        default_target: Target,
        tool_timeout: Duration,
        parent: &Span,
    ) -> Self {
        Self {
            router,
            tools,
            default_target,
            tool_timeout,
            span: tracing::info_span!(parent: parent, "retriever"),
        }
    }

    pub fn default_target(&self) -> &Target {
        &self.default_target
    }

    /// Gather evidence for the default target
    pub async fn gather(&self, query: &str) -> EvidenceList {
        self.gather_for(query, &self.default_target).await.evidence
    }

    /// Gather evidence for an explicit target
    pub async fn gather_for(&self, query: &str, target: &Target) -> Retrieval {
        let decision = self.router.route(query);

        async {
            tracing::info!(
                query = %query,
                dataset = %target.dataset,
                capabilities = ?decision.capabilities(),
                "Retriever routing query to tools"
            );

            let calls = decision
                .capabilities()
                .iter()
                .map(|&capability| self.invoke(capability, target));
            let outcomes = join_all(calls).await;

            let mut evidence = EvidenceList::new();
            let mut failures = Vec::new();

            for (capability, source, result) in outcomes {
                match result {
                    ToolResult::Success(payload) => evidence.extend(normalize(&source, &payload)),
                    ToolResult::Error(message) => {
                        tracing::warn!(
                            capability = %capability,
                            source = %source,
                            error = %message,
                            "Tool call failed, skipping its evidence"
                        );
                        failures.push(ToolFailure { capability, source, message });
                    }
                }
            }

            tracing::info!(
                records = evidence.len(),
                failures = failures.len(),
                "Evidence gathered"
            );

            Retrieval {
                decision: decision.clone(),
                evidence,
                failures,
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Query every adapter once against the default target
    pub async fn probe(&self) -> Vec<ToolProbe> {
        let probes = Capability::ALL.iter().map(|&capability| async move {
            let start = Instant::now();
            let (_, _, result) = self.invoke(capability, &self.default_target).await;
            match result {
                ToolResult::Success(_) => ToolProbe {
                    capability,
                    status: "up",
                    latency_ms: Some(start.elapsed().as_millis() as u64),
                    error: None,
                },
                ToolResult::Error(message) => ToolProbe {
                    capability,
                    status: "down",
                    latency_ms: None,
                    error: Some(message),
                },
            }
        });

        join_all(probes).await
    }

    async fn invoke(&self, capability: Capability, target: &Target) -> (Capability, String, ToolResult) {
        let source = self.tools.adapter(capability).source_prefix(target);
        let result = call_tool(&self.tools, capability, target, self.tool_timeout).await;
        (capability, source, result)
    }
}

/// Query one adapter, bounded by `timeout`
///
/// Errors, timeouts and panics all come back as [`ToolResult::Error`].
pub(crate) async fn call_tool(
    tools: &ToolRegistry,
    capability: Capability,
    target: &Target,
    timeout: Duration,
) -> ToolResult {
    let call = AssertUnwindSafe(tools.adapter(capability).query(target)).catch_unwind();
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => ToolResult::Error(format!("tool panicked: {}", panic_message(panic.as_ref()))),
        Err(_) => ToolResult::Error(format!("tool timed out after {}ms", timeout.as_millis())),
    };

    metrics::record_tool_call(capability.as_str(), result.is_success());
    result
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
