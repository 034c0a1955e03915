//! LakeSense Common Library
//!
//! Shared code for the LakeSense services including:
//! - Query agents (routing, retrieval, reasoning, orchestration)
//! - Data-catalog tool adapters
//! - Completion service abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod agents;
pub mod config;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod tools;

// Re-export commonly used types
pub use agents::{Orchestrator, ResponseEnvelope};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::CompletionService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
