//! Orchestrator - routes a query to one agent and wraps the answer
//!
//! Flow per request:
//! 1. Single-label intent routing picks the responding agent
//! 2. Retrieval (and reasoning, when chosen) or a specialist answers
//! 3. The answer is wrapped in an envelope with provenance

use super::evidence::EvidenceList;
use super::reasoner::{ReasoningEngine, ReasoningOutput};
use super::retriever::{Retrieval, Retriever, ToolFailure};
use super::router::{AgentKind, IntentRouter};
use super::specialists::{SpecialistAgent, SpecialistAnswer};
use crate::config::AppConfig;
use crate::llm::CompletionService;
use crate::metrics;
use crate::tools::{Capability, Target, ToolRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span};
use uuid::Uuid;

/// Answer produced by the responding agent
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentAnswer {
    /// Raw evidence from the retriever
    Evidence {
        agent: &'static str,
        evidence: EvidenceList,
    },
    /// Model answer grounded in evidence
    Reasoned {
        agent: &'static str,
        result: ReasoningOutput,
    },
    /// Reasoning failed; carries the model text when it could not be parsed
    Failed {
        agent: &'static str,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_output: Option<String>,
    },
    Specialist(SpecialistAnswer),
}

impl AgentAnswer {
    fn evidence(evidence: EvidenceList) -> Self {
        AgentAnswer::Evidence {
            agent: "retriever",
            evidence,
        }
    }

    fn reasoned(result: ReasoningOutput) -> Self {
        AgentAnswer::Reasoned {
            agent: "reasoning",
            result,
        }
    }

    fn failed(error: String, raw_output: Option<String>) -> Self {
        AgentAnswer::Failed {
            agent: "reasoning",
            error,
            raw_output,
        }
    }

    /// Whether the responding agent produced a usable answer
    pub fn is_success(&self) -> bool {
        match self {
            AgentAnswer::Evidence { .. } | AgentAnswer::Reasoned { .. } => true,
            AgentAnswer::Failed { .. } => false,
            AgentAnswer::Specialist(answer) => answer.result.is_success(),
        }
    }
}

/// How an answer was produced
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub request_id: Uuid,
    pub agent: AgentKind,
    pub dataset: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    pub evidence_sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_failures: Vec<ToolFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_confidence: Option<f64>,
    pub generated_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Final response for one query
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub answer: AgentAnswer,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// Agent output before it is wrapped
struct Routed {
    answer: AgentAnswer,
    retrieval: Option<Retrieval>,
    model_id: Option<String>,
    reasoning_confidence: Option<f64>,
}

impl Routed {
    fn specialist(answer: SpecialistAnswer) -> Self {
        Self {
            answer: AgentAnswer::Specialist(answer),
            retrieval: None,
            model_id: None,
            reasoning_confidence: None,
        }
    }
}

pub struct Orchestrator {
    router: Arc<IntentRouter>,
    retriever: Retriever,
    reasoner: ReasoningEngine,
    quality: SpecialistAgent,
    lineage: SpecialistAgent,
    envelope_confidence: f64,
    span: Span,
}

impl Orchestrator {
    /// Wire every agent from configuration
    pub fn new(
        config: &AppConfig,
        tools: ToolRegistry,
        completion: Arc<dyn CompletionService>,
        parent: &Span,
    ) -> Self {
        let span = tracing::info_span!(parent: parent, "orchestrator");
        let router = Arc::new(IntentRouter::new());

        let retriever = Retriever::new(
            router.clone(),
            tools.clone(),
            Target::from_config(&config.retrieval),
            config.tool_timeout(),
            &span,
        );
        let reasoner = ReasoningEngine::new(
            completion,
            config.completion_timeout(),
            config.reasoning.clamp_confidence,
            &span,
        );

        Self {
            router,
            retriever,
            reasoner,
            quality: SpecialistAgent::quality(tools.clone(), config.tool_timeout()),
            lineage: SpecialistAgent::lineage(tools, config.tool_timeout()),
            envelope_confidence: config.orchestrator.envelope_confidence,
            span,
        }
    }

    pub fn default_target(&self) -> &Target {
        self.retriever.default_target()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn reasoner(&self) -> &ReasoningEngine {
        &self.reasoner
    }

    /// Answer a query about the default dataset
    pub async fn process(&self, query: &str) -> ResponseEnvelope {
        self.process_for(query, self.default_target()).await
    }

    /// Answer a query about an explicit dataset
    pub async fn process_for(&self, query: &str, target: &Target) -> ResponseEnvelope {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(parent: &self.span, "query", request_id = %request_id);

        async {
            let agent = self.router.route_primary(query);
            tracing::info!(agent = %agent, dataset = %target.dataset, "Routing query");

            let routed = self.dispatch(agent, query, target).await;
            let envelope = self.assemble_response(request_id, agent, target, routed, start);

            metrics::record_query(start.elapsed().as_secs_f64(), agent.as_str());
            tracing::info!(
                agent = %agent,
                success = envelope.answer.is_success(),
                processing_time_ms = envelope.provenance.processing_time_ms,
                "Query processed"
            );

            envelope
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, agent: AgentKind, query: &str, target: &Target) -> Routed {
        match agent {
            AgentKind::Lineage => Routed::specialist(self.lineage.handle(target).await),
            AgentKind::Quality => Routed::specialist(self.quality.handle(target).await),
            AgentKind::Retriever => {
                let retrieval = self.retriever.gather_for(query, target).await;
                Routed {
                    answer: AgentAnswer::evidence(retrieval.evidence.clone()),
                    retrieval: Some(retrieval),
                    model_id: None,
                    reasoning_confidence: None,
                }
            }
            AgentKind::Reasoning => {
                let retrieval = self.retriever.gather_for(query, target).await;
                let (answer, reasoning_confidence) =
                    match self.reasoner.answer(query, &retrieval.evidence).await {
                        Ok(output) => {
                            let confidence = output.confidence;
                            (AgentAnswer::reasoned(output), confidence)
                        }
                        Err(e) => (
                            AgentAnswer::failed(e.to_string(), e.raw_output().map(str::to_string)),
                            None,
                        ),
                    };

                Routed {
                    answer,
                    retrieval: Some(retrieval),
                    model_id: Some(self.reasoner.model_id().to_string()),
                    reasoning_confidence,
                }
            }
        }
    }

    fn assemble_response(
        &self,
        request_id: Uuid,
        agent: AgentKind,
        target: &Target,
        routed: Routed,
        start: Instant,
    ) -> ResponseEnvelope {
        let (capabilities, evidence_sources, tool_failures) = match routed.retrieval {
            Some(retrieval) => (
                retrieval.decision.capabilities().to_vec(),
                retrieval.evidence.sources(),
                retrieval.failures,
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        ResponseEnvelope {
            answer: routed.answer,
            confidence: self.envelope_confidence,
            provenance: Provenance {
                request_id,
                agent,
                dataset: target.dataset.clone(),
                capabilities,
                evidence_sources,
                tool_failures,
                model_id: routed.model_id,
                reasoning_confidence: routed.reasoning_confidence,
                generated_at: Utc::now(),
                processing_time_ms: start.elapsed().as_millis() as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, Result};
    use crate::llm::MockCompletionService;
    use crate::tools::{SimulatedLake, ToolAdapter, ToolResult};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Offline(Capability);

    #[async_trait]
    impl ToolAdapter for Offline {
        fn capability(&self) -> Capability {
            self.0
        }

        fn source_prefix(&self, target: &Target) -> String {
            format!("offline.{}", target.dataset)
        }

        async fn query(&self, _target: &Target) -> ToolResult {
            ToolResult::Error("backend offline".to_string())
        }
    }

    struct Chatty;

    #[async_trait]
    impl CompletionService for Chatty {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("Let me think about that... no JSON today".to_string())
        }

        fn model_id(&self) -> &str {
            "chatty"
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    /// Completion backend that is down
    struct Unreachable;

    #[async_trait]
    impl CompletionService for Unreachable {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(AppError::CompletionService {
                message: "connection refused".to_string(),
            })
        }

        fn model_id(&self) -> &str {
            "unreachable"
        }

        fn provider(&self) -> &str {
            "test"
        }
    }

    /// Quality backend that hangs past the tool timeout
    struct Hung;

    #[async_trait]
    impl ToolAdapter for Hung {
        fn capability(&self) -> Capability {
            Capability::Quality
        }

        fn source_prefix(&self, target: &Target) -> String {
            format!("quality.{}", target.dataset)
        }

        async fn query(&self, _target: &Target) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(3)).await;
            ToolResult::Error("late".to_string())
        }
    }

    fn tools() -> ToolRegistry {
        ToolRegistry::simulated(Arc::new(SimulatedLake::seeded()))
    }

    fn orchestrator(tools: ToolRegistry, completion: Arc<dyn CompletionService>) -> Orchestrator {
        Orchestrator::new(&AppConfig::default(), tools, completion, &Span::none())
    }

    #[tokio::test]
    async fn test_last_updated_query_returns_timestamp() {
        let orchestrator = orchestrator(tools(), Arc::new(MockCompletionService::new()));
        let target = orchestrator.default_target().with_dataset("sakila.actor");

        let envelope = orchestrator
            .process_for("When was sakila.actor dataset last updated?", &target)
            .await;

        assert_eq!(envelope.provenance.agent, AgentKind::Retriever);
        assert!(envelope.answer.is_success());

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["answer"]["agent"], "retriever");
        let last_updated = value["answer"]["evidence"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["source"] == "glue.sakila.actor.last_updated")
            .expect("last_updated evidence");
        assert!(last_updated["snippet"].as_str().unwrap().starts_with("2025-11-12T03:24:00"));
    }

    #[tokio::test]
    async fn test_unmatched_query_without_evidence_is_insufficient() {
        let tools = tools().with_adapter(Arc::new(Offline(Capability::Metadata)));
        let orchestrator = orchestrator(tools, Arc::new(MockCompletionService::new()));

        let envelope = orchestrator.process("tell me a joke").await;

        assert_eq!(envelope.provenance.agent, AgentKind::Reasoning);
        assert!(envelope.provenance.evidence_sources.is_empty());
        assert_eq!(envelope.provenance.tool_failures.len(), 1);
        assert_eq!(envelope.provenance.model_id.as_deref(), Some("mock-completion"));

        match &envelope.answer {
            AgentAnswer::Reasoned { agent, result } => {
                assert_eq!(*agent, "reasoning");
                assert_eq!(result.short_answer, "Insufficient evidence");
            }
            other => panic!("unexpected answer: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_surviving_tool_still_contributes() {
        let tools = tools().with_adapter(Arc::new(Offline(Capability::Quality)));
        let orchestrator = orchestrator(tools, Arc::new(MockCompletionService::new()));

        // Reasoning agent over quality + lineage evidence
        let envelope = orchestrator
            .process("How is the null rate computed, given our assumptions?")
            .await;

        assert_eq!(envelope.provenance.agent, AgentKind::Reasoning);
        assert_eq!(
            envelope.provenance.capabilities,
            vec![Capability::Quality, Capability::Lineage]
        );
        assert!(!envelope.provenance.evidence_sources.is_empty());
        assert!(envelope
            .provenance
            .evidence_sources
            .iter()
            .all(|s| s.starts_with("lineage.columnA.")));
        assert_eq!(envelope.provenance.tool_failures[0].capability, Capability::Quality);
    }

    #[tokio::test]
    async fn test_envelope_confidence_is_constant() {
        let orchestrator = orchestrator(tools(), Arc::new(MockCompletionService::new()));

        for query in ["tell me a joke", "Is table1 fresh?", "How is columnA derived? lineage", "last updated?"] {
            let envelope = orchestrator.process(query).await;
            assert_eq!(envelope.confidence, 0.92, "{query}");
        }

        let reasoned = orchestrator.process("tell me a joke").await;
        assert_eq!(reasoned.provenance.reasoning_confidence, Some(0.5));
    }

    #[tokio::test]
    async fn test_unparseable_model_output_is_reported() {
        let orchestrator = orchestrator(tools(), Arc::new(Chatty));
        let envelope = orchestrator.process("What provenance backs this?").await;

        assert!(!envelope.answer.is_success());
        let value = serde_json::to_value(&envelope.answer).unwrap();
        assert_eq!(value["agent"], "reasoning");
        assert_eq!(value["error"], "Failed to parse model output");
        assert_eq!(value["raw_output"], "Let me think about that... no JSON today");
    }

    #[tokio::test]
    async fn test_specialists_answer_directly() {
        let orchestrator = orchestrator(tools(), Arc::new(MockCompletionService::new()));

        let quality = orchestrator.process("Is table1 fresh?").await;
        assert_eq!(quality.provenance.agent, AgentKind::Quality);
        let value = serde_json::to_value(&quality.answer).unwrap();
        assert_eq!(value["agent"], "quality");
        assert_eq!(value["status"], "success");
        assert!(quality.provenance.model_id.is_none());

        let lineage = orchestrator.process("Show lineage for columnA").await;
        let value = serde_json::to_value(&lineage).unwrap();
        assert_eq!(value["answer"]["producing_service"], "IOT API Integration");
        assert!(value["provenance"].get("capabilities").is_none());
    }

    #[tokio::test]
    async fn test_completion_failure_is_reported_without_raw_output() {
        let orchestrator = orchestrator(tools(), Arc::new(Unreachable));
        let envelope = orchestrator.process("What provenance backs this?").await;

        assert!(!envelope.answer.is_success());
        assert_eq!(envelope.confidence, 0.92);
        assert_eq!(envelope.provenance.model_id.as_deref(), Some("unreachable"));
        assert!(envelope.provenance.reasoning_confidence.is_none());
        assert!(envelope
            .provenance
            .evidence_sources
            .iter()
            .any(|s| s.starts_with("glue.table1.")));

        let value = serde_json::to_value(&envelope.answer).unwrap();
        assert_eq!(value["agent"], "reasoning");
        assert!(value["error"].as_str().unwrap().contains("connection refused"));
        assert!(value.get("raw_output").is_none());
    }

    #[tokio::test]
    async fn test_specialist_tool_respects_timeout() {
        let mut config = AppConfig::default();
        config.retrieval.tool_timeout_secs = 1;
        let orchestrator = Orchestrator::new(
            &config,
            tools().with_adapter(Arc::new(Hung)),
            Arc::new(MockCompletionService::new()),
            &Span::none(),
        );

        let start = Instant::now();
        let envelope = orchestrator.process("Is table1 fresh?").await;

        assert!(start.elapsed() < Duration::from_millis(1500));
        assert_eq!(envelope.provenance.agent, AgentKind::Quality);
        let value = serde_json::to_value(&envelope.answer).unwrap();
        assert_eq!(value["agent"], "quality");
        assert_eq!(value["status"], "error");
        assert!(value["error_message"].as_str().unwrap().contains("timed out"));
    }
}
