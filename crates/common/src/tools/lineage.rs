//! Lineage adapter (dataset + column → producing service and upstream sources)

use super::{Capability, SimulatedLake, Target, ToolAdapter, ToolPayload, ToolResult};
use crate::errors::{AppError, Result};
use serde_json::json;
use std::sync::Arc;

pub struct LineageAdapter {
    lake: Arc<SimulatedLake>,
}

impl LineageAdapter {
    pub fn new(lake: Arc<SimulatedLake>) -> Self {
        Self { lake }
    }

    fn column_lineage(&self, dataset: &str, column: &str) -> Result<ToolPayload> {
        let record = self.lake.dataset(dataset)?;
        let col = record.column(column).ok_or_else(|| AppError::NotFound {
            resource_type: format!("column of '{}'", dataset),
            id: column.to_string(),
        })?;

        let mut payload = ToolPayload::new();
        payload.insert("dataset".into(), json!(record.name));
        payload.insert("column".into(), json!(col.name));
        payload.insert("producing_service".into(), json!(record.producing_service));
        payload.insert("kafka_topic".into(), json!(record.kafka_topic));
        payload.insert("upstream_sources".into(), json!(record.upstream_sources.join(",")));
        payload.insert(
            "transformation".into(),
            json!(col.transformation.as_deref().unwrap_or("none (copied as ingested)")),
        );
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl ToolAdapter for LineageAdapter {
    fn capability(&self) -> Capability {
        Capability::Lineage
    }

    fn source_prefix(&self, target: &Target) -> String {
        format!("lineage.{}", target.column)
    }

    async fn query(&self, target: &Target) -> ToolResult {
        tracing::debug!(dataset = %target.dataset, column = %target.column, "Fetching column lineage");
        self.column_lineage(&target.dataset, &target.column).into()
    }
}
