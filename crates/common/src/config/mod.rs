//! Configuration management for LakeSense services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion (LLM) service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Evidence retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Reasoning engine configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Orchestrator configuration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Completion provider: openai, mock
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    /// Model identifier sent to the provider
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Chat-completions endpoint
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    /// API key (mock provider is used when absent)
    pub api_key: Option<String>,

    /// Upper bound on one completion call, in seconds
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Attempts per completion call
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Catalog database the default dataset lives in
    #[serde(default = "default_database")]
    pub database: String,

    /// Dataset queried when the request names none
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Column used for lineage lookups
    #[serde(default = "default_column")]
    pub column: String,

    /// Storage bucket of the default dataset
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Storage prefix of the default dataset
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Upper bound on a single tool call, in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// JSON file with simulated lake fixtures (built-in seed when absent)
    pub fixtures_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReasoningConfig {
    /// Clamp model confidence into [0, 1] instead of passing it through
    #[serde(default)]
    pub clamp_confidence: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Confidence reported on every response envelope
    #[serde(default = "default_envelope_confidence")]
    pub envelope_confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 90 }
fn default_completion_provider() -> String { "openai".to_string() }
fn default_completion_model() -> String { "gpt-4o-mini".to_string() }
fn default_completion_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_completion_timeout() -> u64 { 60 }
fn default_connect_timeout() -> u64 { 10 }
fn default_completion_retries() -> u32 { 3 }
fn default_max_tokens() -> usize { 512 }
fn default_temperature() -> f32 { 0.0 }
fn default_database() -> String { "default".to_string() }
fn default_dataset() -> String { "table1".to_string() }
fn default_column() -> String { "columnA".to_string() }
fn default_bucket() -> String { "my-bucket".to_string() }
fn default_prefix() -> String { "data/table1/".to_string() }
fn default_tool_timeout() -> u64 { 10 }
fn default_envelope_confidence() -> f64 { 0.92 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "lakesense".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            endpoint: default_completion_endpoint(),
            api_key: None,
            timeout_secs: default_completion_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_completion_retries(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            dataset: default_dataset(),
            column: default_column(),
            bucket: default_bucket(),
            prefix: default_prefix(),
            tool_timeout_secs: default_tool_timeout(),
            fixtures_path: None,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            envelope_confidence: default_envelope_confidence(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__COMPLETION__MODEL=gpt-4o
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get completion timeout as Duration
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion.timeout_secs)
    }

    /// Get tool call timeout as Duration
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval.tool_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.completion.timeout_secs, 60);
        assert_eq!(config.completion.max_retries, 3);
        assert_eq!(config.retrieval.dataset, "table1");
        assert_eq!(config.retrieval.column, "columnA");
        assert!((config.orchestrator.envelope_confidence - 0.92).abs() < f64::EPSILON);
        assert!(!config.reasoning.clamp_confidence);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "completion": { "model": "claude-sonnet", "timeout_secs": 5 },
            "retrieval": { "dataset": "sakila.actor" }
        }))
        .unwrap();

        assert_eq!(config.completion.model, "claude-sonnet");
        assert_eq!(config.completion_timeout(), Duration::from_secs(5));
        assert_eq!(config.completion.max_retries, 3);
        assert_eq!(config.retrieval.dataset, "sakila.actor");
        assert_eq!(config.retrieval.bucket, "my-bucket");
        assert_eq!(config.server.port, 8080);
    }
}
