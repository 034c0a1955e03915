//! Quality adapter (dataset → freshness and null-rate report)

use super::{Capability, SimulatedLake, Target, ToolAdapter, ToolPayload, ToolResult};
use crate::errors::Result;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

pub struct QualityAdapter {
    lake: Arc<SimulatedLake>,
}

impl QualityAdapter {
    pub fn new(lake: Arc<SimulatedLake>) -> Self {
        Self { lake }
    }

    fn quality_report(&self, dataset: &str) -> Result<ToolPayload> {
        let record = self.lake.dataset(dataset)?;
        let freshness_hours = (Utc::now() - record.last_updated).num_hours().max(0);

        let mut payload = ToolPayload::new();
        payload.insert("last_updated".into(), json!(record.last_updated.to_rfc3339()));
        payload.insert("freshness_hours".into(), json!(freshness_hours));
        payload.insert("null_rate".into(), json!(record.null_rate));
        payload.insert("row_count".into(), json!(record.row_count));
        payload.insert("checks_passed".into(), json!(record.checks_passed));
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl ToolAdapter for QualityAdapter {
    fn capability(&self) -> Capability {
        Capability::Quality
    }

    fn source_prefix(&self, target: &Target) -> String {
        format!("quality.{}", target.dataset)
    }

    async fn query(&self, target: &Target) -> ToolResult {
        tracing::debug!(dataset = %target.dataset, "Fetching quality report");
        self.quality_report(&target.dataset).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;

    #[tokio::test]
    async fn test_quality_report() {
        let adapter = QualityAdapter::new(Arc::new(SimulatedLake::seeded()));
        let target = Target::from_config(&RetrievalConfig::default());

        let ToolResult::Success(payload) = adapter.query(&target).await else {
            panic!("expected success");
        };
        assert_eq!(payload["null_rate"], 0.02);
        assert!(payload["freshness_hours"].as_i64().unwrap() > 0);
        assert_eq!(payload.keys().next().map(String::as_str), Some("last_updated"));
    }

    #[tokio::test]
    async fn test_missing_dataset() {
        let adapter = QualityAdapter::new(Arc::new(SimulatedLake::seeded()));
        let target = Target::from_config(&RetrievalConfig::default()).with_dataset("orders");

        assert_eq!(
            adapter.query(&target).await,
            ToolResult::Error("Dataset 'orders' not found".into())
        );
    }
}
