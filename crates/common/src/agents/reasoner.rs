//! Reasoning Engine - evidence-grounded answers from the completion service
//!
//! Provides:
//! - Prompt construction over an indexed evidence block
//! - Timeout-bounded completion calls
//! - Tolerant JSON extraction from model output
//! - Confidence normalisation

use super::evidence::EvidenceList;
use crate::errors::{AppError, Result};
use crate::llm::CompletionService;
use crate::metrics;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span};

/// Placed in the evidence block when there is no evidence
pub const NO_EVIDENCE_MARKER: &str = "(no evidence provided)";

/// Answer the model is told to give when evidence is insufficient
pub const INSUFFICIENT_EVIDENCE: &str = "Insufficient evidence";

/// Normalised model answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningOutput {
    /// One-line answer
    pub short_answer: String,

    /// Which evidence was used and why
    pub explanation: String,

    /// Model-reported confidence; null when absent or not numeric
    pub confidence: Option<f64>,

    /// Evidence indexes and source identifiers the model cited
    pub sources: Vec<String>,

    /// Unmodified completion text
    pub raw_model_output: String,
}

/// Reasoning engine over a completion service
pub struct ReasoningEngine {
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
    clamp_confidence: bool,
    span: Span,
}

impl ReasoningEngine {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        timeout: Duration,
        clamp_confidence: bool,
        parent: &Span,
    ) -> Self {
        Self {
            completion,
            timeout,
            clamp_confidence,
            span: tracing::info_span!(parent: parent, "reasoner"),
        }
    }

    pub fn model_id(&self) -> &str {
        self.completion.model_id()
    }

    pub fn provider(&self) -> &str {
        self.completion.provider()
    }

    /// Answer a query from the given evidence
    pub async fn answer(&self, query: &str, evidence: &EvidenceList) -> Result<ReasoningOutput> {
        async {
            let prompt = build_prompt(query, evidence);
            let model = self.completion.model_id().to_string();
            let start = Instant::now();

            tracing::info!(
                model = %model,
                evidence = evidence.len(),
                "Invoking completion service"
            );

            let raw = match tokio::time::timeout(self.timeout, self.completion.complete(&prompt)).await {
                Ok(Ok(raw)) => {
                    metrics::record_completion(start.elapsed().as_secs_f64(), &model, true);
                    raw
                }
                Ok(Err(e)) => {
                    metrics::record_completion(start.elapsed().as_secs_f64(), &model, false);
                    tracing::error!(model = %model, error = %e, "Completion call failed");
                    return Err(match e {
                        AppError::CompletionService { .. } | AppError::CompletionTimeout { .. } => e,
                        other => AppError::CompletionService {
                            message: other.to_string(),
                        },
                    });
                }
                Err(_) => {
                    metrics::record_completion(start.elapsed().as_secs_f64(), &model, false);
                    tracing::error!(
                        model = %model,
                        timeout_secs = self.timeout.as_secs(),
                        "Completion call timed out"
                    );
                    return Err(AppError::CompletionTimeout {
                        timeout_secs: self.timeout.as_secs(),
                    });
                }
            };

            parse_model_output(&raw, self.clamp_confidence).map_err(|e| {
                metrics::record_parse_failure(&model);
                tracing::error!(model = %model, "Failed to parse model output as JSON");
                e
            })
        }
        .instrument(self.span.clone())
        .await
    }
}

/// Build the evidence-only prompt
pub fn build_prompt(query: &str, evidence: &EvidenceList) -> String {
    let mut block = String::new();
    if evidence.is_empty() {
        block.push_str(NO_EVIDENCE_MARKER);
        block.push('\n');
    } else {
        for (i, record) in evidence.iter().enumerate() {
            let _ = write!(block, "[{}] source: {}\n{}\n\n", i + 1, record.source, record.snippet);
        }
    }

    format!(
        "You are a data-lake discovery assistant. Answer ONLY from the evidence below.\n\
         If the evidence does not support a factual answer, the short_answer must be exactly \"{insufficient}\".\n\
         \n\
         User question:\n\
         {query}\n\
         \n\
         --EVIDENCE--\n\
         {block}\
         --END EVIDENCE--\n\
         \n\
         Respond with a single JSON object with these keys:\n\
         - short_answer: one line answering the question, or \"{insufficient}\"\n\
         - explanation: one to three sentences naming the evidence used\n\
         - confidence: a number between 0.0 and 1.0\n\
         - sources: the evidence indexes and source identifiers used, e.g. \"[1] glue.table1.last_updated\"\n\
         Do not invent sources or facts that are not in the evidence.",
        insufficient = INSUFFICIENT_EVIDENCE,
        query = query,
        block = block,
    )
}

/// Parse raw model text into a [`ReasoningOutput`]
///
/// Tries the whole text first, then the span from the first `{` to the
/// last `}`.
pub fn parse_model_output(raw: &str, clamp_confidence: bool) -> Result<ReasoningOutput> {
    let object = extract_object(raw).ok_or_else(|| AppError::ModelOutputParse {
        raw_output: raw.to_string(),
    })?;

    Ok(ReasoningOutput {
        short_answer: first_text(&object, &["short_answer", "shortAnswer"]),
        explanation: object.get("explanation").map(text).unwrap_or_default(),
        confidence: coerce_confidence(object.get("confidence"), clamp_confidence),
        sources: coerce_sources(object.get("sources")),
        raw_model_output: raw.to_string(),
    })
}

fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(raw.trim()) {
        return Some(map);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// First key holding a non-empty value
fn first_text(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .map(text)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_sources(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(text).collect(),
        Some(scalar) => vec![text(scalar)],
    }
}

fn coerce_confidence(value: Option<&Value>, clamp: bool) -> Option<f64> {
    let confidence = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        // Booleans are not read as 0/1
        _ => None,
    }
    .filter(|c| c.is_finite())?;

    if (0.0..=1.0).contains(&confidence) {
        return Some(confidence);
    }

    tracing::warn!(confidence = confidence, clamped = clamp, "Model confidence outside [0, 1]");
    Some(if clamp { confidence.clamp(0.0, 1.0) } else { confidence })
}
