//! Query agents
//!
//! - `router`: keyword intent classification
//! - `evidence`: tool payload → evidence records
//! - `retriever`: concurrent evidence gathering
//! - `reasoner`: evidence-grounded completion
//! - `specialists`: quality and lineage answers
//! - `orchestrator`: routing and response assembly

pub mod evidence;
pub mod orchestrator;
pub mod reasoner;
pub mod retriever;
pub mod router;
pub mod specialists;

pub use evidence::{normalize, EvidenceList, EvidenceRecord};
pub use orchestrator::{AgentAnswer, Orchestrator, Provenance, ResponseEnvelope};
pub use reasoner::{ReasoningEngine, ReasoningOutput};
pub use retriever::{Retrieval, Retriever, ToolFailure, ToolProbe};
pub use router::{AgentDescriptor, AgentKind, IntentRouter, RoutingDecision};
pub use specialists::{SpecialistAgent, SpecialistAnswer};
