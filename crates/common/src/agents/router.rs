//! Intent Router - keyword classification of data-lake questions
//!
//! Two policies over the same lower-cased query:
//! - multi-label: every capability whose keywords match, used to pick tools
//!   before evidence gathering (fallback: metadata)
//! - single-label: first match over a fixed priority list, used to pick the
//!   responding agent (fallback: reasoning)

use crate::tools::Capability;
use serde::Serialize;
use std::fmt;

/// Agent that answers a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgentKind {
    #[serde(rename = "lineage_agent")]
    Lineage,
    #[serde(rename = "quality_agent")]
    Quality,
    #[serde(rename = "retriever_agent")]
    Retriever,
    #[serde(rename = "reasoning_agent")]
    Reasoning,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Lineage,
        AgentKind::Quality,
        AgentKind::Retriever,
        AgentKind::Reasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Lineage => "lineage_agent",
            AgentKind::Quality => "quality_agent",
            AgentKind::Retriever => "retriever_agent",
            AgentKind::Reasoning => "reasoning_agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Lineage => "Data lineage: producing services, upstream sources, derivations",
            AgentKind::Quality => "Data quality: freshness, completeness, null rates",
            AgentKind::Retriever => "Metadata retrieval: schemas, storage layout, update timestamps",
            AgentKind::Reasoning => "Evidence-grounded synthesis for multi-source questions",
        }
    }

    /// Roster of every agent, in routing priority order
    pub fn catalog() -> Vec<AgentDescriptor> {
        Self::ALL
            .iter()
            .map(|&kind| AgentDescriptor {
                name: kind,
                description: kind.description(),
            })
            .collect()
    }
}

/// Public description of an agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub name: AgentKind,
    pub description: &'static str,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty, ordered, de-duplicated set of capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutingDecision(Vec<Capability>);

impl RoutingDecision {
    fn single(capability: Capability) -> Self {
        Self(vec![capability])
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.0
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

struct KeywordRule<T> {
    target: T,
    keywords: &'static [&'static str],
}

impl<T> KeywordRule<T> {
    fn matches(&self, query: &str) -> bool {
        self.keywords.iter().any(|k| query.contains(k))
    }
}

/// Deterministic keyword router
pub struct IntentRouter {
    capability_rules: Vec<KeywordRule<Capability>>,
    capability_fallback: Capability,
    agent_rules: Vec<KeywordRule<AgentKind>>,
    agent_fallback: AgentKind,
}

impl IntentRouter {
    pub fn new() -> Self {
        Self {
            capability_rules: vec![
                KeywordRule { target: Capability::Metadata, keywords: &["last updated", "when was"] },
                KeywordRule { target: Capability::Quality, keywords: &["quality", "null rate", "fresh"] },
                KeywordRule { target: Capability::Lineage, keywords: &["lineage", "derived", "how is"] },
                KeywordRule { target: Capability::Storage, keywords: &["partition", "storage", "file"] },
            ],
            capability_fallback: Capability::Metadata,
            // Priority order: first match wins
            agent_rules: vec![
                KeywordRule { target: AgentKind::Lineage, keywords: &["lineage", "derived"] },
                KeywordRule { target: AgentKind::Quality, keywords: &["quality", "fresh"] },
                KeywordRule { target: AgentKind::Retriever, keywords: &["last updated", "update"] },
                KeywordRule { target: AgentKind::Reasoning, keywords: &["assumption", "provenance"] },
            ],
            agent_fallback: AgentKind::Reasoning,
        }
    }

    /// Multi-label routing: every matching capability, never empty
    pub fn route(&self, query: &str) -> RoutingDecision {
        let query = query.to_lowercase();

        let matched: Vec<Capability> = self
            .capability_rules
            .iter()
            .filter(|rule| rule.matches(&query))
            .map(|rule| rule.target)
            .collect();

        if matched.is_empty() {
            RoutingDecision::single(self.capability_fallback)
        } else {
            RoutingDecision(matched)
        }
    }

    /// Single-label routing: the agent that should answer
    pub fn route_primary(&self, query: &str) -> AgentKind {
        let query = query.to_lowercase();

        self.agent_rules
            .iter()
            .find(|rule| rule.matches(&query))
            .map(|rule| rule.target)
            .unwrap_or(self.agent_fallback)
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}
