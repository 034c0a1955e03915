//! Catalog metadata adapter (table schema, columns, last-modified)

use super::{Capability, SimulatedLake, Target, ToolAdapter, ToolPayload, ToolResult};
use crate::errors::{AppError, Result};
use serde_json::json;
use std::sync::Arc;

/// Glue-style catalog lookup
pub struct CatalogAdapter {
    lake: Arc<SimulatedLake>,
}

impl CatalogAdapter {
    pub fn new(lake: Arc<SimulatedLake>) -> Self {
        Self { lake }
    }

    fn table_metadata(&self, target: &Target) -> Result<ToolPayload> {
        let record = self.lake.dataset(&target.dataset)?;
        if record.database != target.database {
            return Err(AppError::NotFound {
                resource_type: format!("table in database '{}'", target.database),
                id: target.dataset.clone(),
            });
        }

        let columns = record
            .columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");

        let mut payload = ToolPayload::new();
        payload.insert("database".into(), json!(record.database));
        payload.insert("table".into(), json!(record.table));
        payload.insert("columns".into(), json!(columns));
        payload.insert("column_count".into(), json!(record.columns.len()));
        payload.insert("file_format".into(), json!(record.file_format));
        payload.insert("location".into(), json!(record.location()));
        payload.insert("last_updated".into(), json!(record.last_updated.to_rfc3339()));
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl ToolAdapter for CatalogAdapter {
    fn capability(&self) -> Capability {
        Capability::Metadata
    }

    fn source_prefix(&self, target: &Target) -> String {
        format!("glue.{}", target.dataset)
    }

    async fn query(&self, target: &Target) -> ToolResult {
        tracing::debug!(database = %target.database, dataset = %target.dataset, "Fetching table metadata");
        self.table_metadata(target).into()
    }
}
