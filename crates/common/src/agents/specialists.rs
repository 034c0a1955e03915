//! Quality and lineage agents
//!
//! Each answers straight from its adapter for one target. Tool errors,
//! timeouts and panics are reported in the answer rather than hidden.

use super::retriever::call_tool;
use crate::tools::{Capability, Target, ToolRegistry, ToolResult};
use serde::Serialize;
use std::time::Duration;

/// Answer from a specialist agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialistAnswer {
    pub agent: &'static str,
    pub dataset: String,
    #[serde(flatten)]
    pub result: ToolResult,
}

/// Agent backed by a single tool capability
pub struct SpecialistAgent {
    name: &'static str,
    capability: Capability,
    tools: ToolRegistry,
    tool_timeout: Duration,
}

impl SpecialistAgent {
    /// Freshness, completeness and null rates
    pub fn quality(tools: ToolRegistry, tool_timeout: Duration) -> Self {
        Self {
            name: "quality",
            capability: Capability::Quality,
            tools,
            tool_timeout,
        }
    }

    /// Producing services and upstream sources
    pub fn lineage(tools: ToolRegistry, tool_timeout: Duration) -> Self {
        Self {
            name: "lineage",
            capability: Capability::Lineage,
            tools,
            tool_timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn handle(&self, target: &Target) -> SpecialistAnswer {
        let result = call_tool(&self.tools, self.capability, target, self.tool_timeout).await;

        if let ToolResult::Error(message) = &result {
            tracing::warn!(
                agent = self.name,
                dataset = %target.dataset,
                error = %message,
                "Specialist tool call failed"
            );
        }

        SpecialistAnswer {
            agent: self.name,
            dataset: target.dataset.clone(),
            result,
        }
    }
}
