//! Completion service abstraction
//!
//! The language model is an opaque text-completion service: a prompt goes
//! in, text comes out. Providers:
//! - OpenAI-compatible chat completions (any endpoint speaking that API)
//! - Mock (deterministic, evidence-echoing; used when no key is configured)

use crate::agents::reasoner::NO_EVIDENCE_MARKER;
use crate::config::CompletionConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Trait for text completion
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a prompt, returning the raw model text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model identifier
    fn model_id(&self) -> &str;

    /// Get the provider name
    fn provider(&self) -> &str;
}

/// Client for OpenAI-compatible chat-completions endpoints
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    max_retries: u32,
    max_tokens: usize,
    temperature: f32,
    attempt_timeout: Duration,
    retry_window: Duration,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

impl ChatCompletionClient {
    /// Create a new chat-completions client
    pub fn new(api_key: String, config: &CompletionConfig) -> Result<Self> {
        let attempt_timeout = attempt_timeout(config);
        let client = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries.max(1),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            attempt_timeout,
            retry_window: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Make request with retry
    async fn request_with_retry(&self, prompt: &str) -> Result<String> {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(self.retry_window))
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let max_retries = self.max_retries;

        backoff::future::retry_notify(
            schedule,
            || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                match self.make_request(prompt).await {
                    Err(backoff::Error::Transient { err, .. }) if attempt >= max_retries => {
                        Err(backoff::Error::permanent(err))
                    }
                    other => other,
                }
            },
            |err: AppError, delay: Duration| {
                tracing::warn!(
                    attempt = attempts.load(Ordering::SeqCst),
                    max_retries = max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Completion request failed, retrying"
                );
            },
        )
        .await
    }

    async fn make_request(&self, prompt: &str) -> std::result::Result<String, backoff::Error<AppError>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a data-lake discovery assistant. Reply with JSON only.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::CompletionService {
                    message: format!("Request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::CompletionService {
                message: format!("API error {}: {}", status, body),
            };
            // Client errors other than throttling will not succeed on retry
            return if status.is_client_error() && status.as_u16() != 429 {
                Err(backoff::Error::permanent(err))
            } else {
                Err(backoff::Error::transient(err))
            };
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::CompletionService {
                message: format!("Failed to decode response envelope: {}", e),
            })
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                backoff::Error::permanent(AppError::CompletionService {
                    message: "Empty response from completion service".to_string(),
                })
            })
    }
}

/// Per-attempt budget: the overall timeout split across `max_retries`
fn attempt_timeout(config: &CompletionConfig) -> Duration {
    let total = Duration::from_secs(config.timeout_secs);
    (total / config.max_retries.max(1)).max(Duration::from_millis(500)).min(total)
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.request_with_retry(prompt).await
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "openai"
    }
}

/// Mock completion service for development and testing
///
/// Answers with the first evidence snippet, or "Insufficient evidence" when
/// the prompt carries none.
pub struct MockCompletionService {
    model: String,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            model: "mock-completion".to_string(),
        }
    }

    fn respond(&self, prompt: &str) -> String {
        if prompt.contains(NO_EVIDENCE_MARKER) {
            return serde_json::json!({
                "short_answer": "Insufficient evidence",
                "explanation": "No evidence was provided for this question.",
                "confidence": 0.0,
                "sources": [],
            })
            .to_string();
        }

        let mut lines = prompt.lines();
        let first = lines
            .by_ref()
            .find_map(|line| line.strip_prefix("[1] source: "))
            .map(|source| source.trim().to_string());

        match first {
            Some(source) => {
                let snippet = lines.next().unwrap_or_default().trim();
                serde_json::json!({
                    "short_answer": snippet,
                    "explanation": format!("Taken from evidence [1] ({}).", source),
                    "confidence": 0.5,
                    "sources": [format!("[1] {}", source)],
                })
                .to_string()
            }
            None => serde_json::json!({
                "short_answer": "Insufficient evidence",
                "explanation": "The evidence block could not be read.",
                "confidence": 0.0,
                "sources": [],
            })
            .to_string(),
        }
    }
}

impl Default for MockCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self.respond(prompt))
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

/// Create a completion service based on configuration
pub fn create_completion_service(config: &CompletionConfig) -> Result<Arc<dyn CompletionService>> {
    match (config.provider.as_str(), config.api_key.as_deref()) {
        ("openai", Some(key)) if !key.is_empty() => {
            Ok(Arc::new(ChatCompletionClient::new(key.to_string(), config)?))
        }
        ("openai", _) => {
            tracing::warn!("Completion API key not configured, using mock provider");
            Ok(Arc::new(MockCompletionService::new()))
        }
        ("mock", _) => Ok(Arc::new(MockCompletionService::new())),
        (provider, _) => {
            tracing::warn!(provider = provider, "Unknown completion provider, using mock");
            Ok(Arc::new(MockCompletionService::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_insufficient_without_evidence() {
        let service = MockCompletionService::new();
        let prompt = format!("Question: anything\n--EVIDENCE--\n{}\n--END EVIDENCE--", NO_EVIDENCE_MARKER);

        let raw = service.complete(&prompt).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(parsed["short_answer"], "Insufficient evidence");
        assert_eq!(parsed["sources"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_mock_echoes_first_evidence() {
        let service = MockCompletionService::new();
        let prompt = "--EVIDENCE--\n[1] source: glue.table1.last_updated\n2024-01-15T12:34:56Z\n\n--END EVIDENCE--";

        let raw = service.complete(prompt).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(parsed["short_answer"], "2024-01-15T12:34:56Z");
        assert_eq!(parsed["sources"][0], "[1] glue.table1.last_updated");
    }

    #[test]
    fn test_factory_falls_back_to_mock_without_key() {
        let config = CompletionConfig::default();
        let service = create_completion_service(&config).unwrap();
        assert_eq!(service.provider(), "mock");

        let config = CompletionConfig {
            api_key: Some("sk-test".to_string()),
            ..CompletionConfig::default()
        };
        let service = create_completion_service(&config).unwrap();
        assert_eq!(service.provider(), "openai");
        assert_eq!(service.model_id(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_service_error() {
        let config = CompletionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            max_retries: 1,
            timeout_secs: 2,
            connect_timeout_secs: 1,
            ..CompletionConfig::default()
        };
        let client = ChatCompletionClient::new("sk-test".to_string(), &config).unwrap();

        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, AppError::CompletionService { .. }));
    }

    #[test]
    fn test_attempt_timeout_leaves_room_for_retries() {
        let config = CompletionConfig {
            timeout_secs: 60,
            max_retries: 3,
            ..CompletionConfig::default()
        };
        let client = ChatCompletionClient::new("sk-test".to_string(), &config).unwrap();
        assert_eq!(client.attempt_timeout(), Duration::from_secs(20));

        let single = CompletionConfig {
            max_retries: 0,
            ..config
        };
        assert_eq!(attempt_timeout(&single), Duration::from_secs(60));
    }
}
