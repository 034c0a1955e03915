//! Storage layout adapter (bucket/prefix → partitions and files)

use super::{Capability, SimulatedLake, Target, ToolAdapter, ToolPayload, ToolResult};
use crate::errors::Result;
use serde_json::json;
use std::sync::Arc;

/// S3-style storage inspection
pub struct StorageAdapter {
    lake: Arc<SimulatedLake>,
}

impl StorageAdapter {
    pub fn new(lake: Arc<SimulatedLake>) -> Self {
        Self { lake }
    }

    fn storage_info(&self, bucket: &str, prefix: &str) -> Result<ToolPayload> {
        let record = self.lake.by_location(bucket, prefix)?;

        let mut payload = ToolPayload::new();
        payload.insert("bucket".into(), json!(record.bucket));
        payload.insert("prefix".into(), json!(record.prefix));
        payload.insert("partition_keys".into(), json!(record.partition_keys.join(",")));
        payload.insert("partition_count".into(), json!(record.partition_count));
        payload.insert("file_count".into(), json!(record.file_count));
        payload.insert("total_size_bytes".into(), json!(record.total_size_bytes));
        payload.insert("file_format".into(), json!(record.file_format));
        Ok(payload)
    }
}

#[async_trait::async_trait]
impl ToolAdapter for StorageAdapter {
    fn capability(&self) -> Capability {
        Capability::Storage
    }

    fn source_prefix(&self, target: &Target) -> String {
        format!("s3.{}", target.dataset)
    }

    async fn query(&self, target: &Target) -> ToolResult {
        tracing::debug!(bucket = %target.bucket, prefix = %target.prefix, "Fetching storage info");
        self.storage_info(&target.bucket, &target.prefix).into()
    }
}
