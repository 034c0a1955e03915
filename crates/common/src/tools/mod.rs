//! Data-catalog tool adapters
//!
//! One adapter per backend capability:
//! - Catalog metadata (schema, columns, last-modified)
//! - Storage layout (bucket/prefix → partitions, files)
//! - Lineage (dataset + column → producing service, upstream sources)
//! - Quality (dataset → freshness, null rate)
//!
//! Every call yields exactly one [`ToolResult`]; adapters never fail the
//! caller.

mod catalog;
mod lake;
mod lineage;
mod quality;
mod storage;

pub use catalog::CatalogAdapter;
pub use lake::{ColumnRecord, DatasetRecord, SimulatedLake};
pub use lineage::LineageAdapter;
pub use quality::QualityAdapter;
pub use storage::StorageAdapter;

use crate::config::RetrievalConfig;
use crate::errors::AppError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Insertion-ordered key/value payload returned by a successful tool call
pub type ToolPayload = serde_json::Map<String, serde_json::Value>;

/// Backend capability a tool adapter serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Catalog metadata
    Metadata,
    /// Freshness and null-rate reports
    Quality,
    /// Column lineage
    Lineage,
    /// Partition and file layout
    Storage,
}

impl Capability {
    /// Every capability, in routing order
    pub const ALL: [Capability; 4] = [
        Capability::Metadata,
        Capability::Quality,
        Capability::Lineage,
        Capability::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Metadata => "metadata",
            Capability::Quality => "quality",
            Capability::Lineage => "lineage",
            Capability::Storage => "storage",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(ToolPayload),
    Error(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }
}

impl From<crate::errors::Result<ToolPayload>> for ToolResult {
    fn from(result: crate::errors::Result<ToolPayload>) -> Self {
        match result {
            Ok(payload) => ToolResult::Success(payload),
            Err(e) => ToolResult::Error(e.to_string()),
        }
    }
}

// Boundary shape: {"status": "success", ...} or {"status": "error", "error_message": ...}
impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ToolResult::Success(payload) => {
                let mut map = serializer.serialize_map(Some(payload.len() + 1))?;
                map.serialize_entry("status", "success")?;
                for (key, value) in payload {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            ToolResult::Error(message) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", "error")?;
                map.serialize_entry("error_message", message)?;
                map.end()
            }
        }
    }
}

/// Dataset a tool call is aimed at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub database: String,
    pub dataset: String,
    pub column: String,
    pub bucket: String,
    pub prefix: String,
}

impl Target {
    /// Default target from retrieval configuration
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            database: config.database.clone(),
            dataset: config.dataset.clone(),
            column: config.column.clone(),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
        }
    }

    /// Retarget at another dataset, keeping bucket and column.
    ///
    /// `db.table` names set the database; the storage prefix follows the
    /// `data/<db>/<table>/` layout.
    pub fn with_dataset(&self, dataset: &str) -> Self {
        let database = match dataset.split_once('.') {
            Some((db, _)) => db.to_string(),
            None => self.database.clone(),
        };

        Self {
            database,
            dataset: dataset.to_string(),
            column: self.column.clone(),
            bucket: self.bucket.clone(),
            prefix: format!("data/{}/", dataset.replace('.', "/")),
        }
    }
}

/// Common trait for all tool adapters
#[async_trait::async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Capability this adapter serves
    fn capability(&self) -> Capability;

    /// Dotted prefix for evidence produced from this adapter's output
    fn source_prefix(&self, target: &Target) -> String;

    /// Query the backend for the target
    async fn query(&self, target: &Target) -> ToolResult;
}

/// Dispatch table from capability to adapter
#[derive(Clone)]
pub struct ToolRegistry {
    catalog: Arc<dyn ToolAdapter>,
    storage: Arc<dyn ToolAdapter>,
    lineage: Arc<dyn ToolAdapter>,
    quality: Arc<dyn ToolAdapter>,
}

impl ToolRegistry {
    /// Registry backed by the simulated lake
    pub fn simulated(lake: Arc<SimulatedLake>) -> Self {
        Self {
            catalog: Arc::new(CatalogAdapter::new(lake.clone())),
            storage: Arc::new(StorageAdapter::new(lake.clone())),
            lineage: Arc::new(LineageAdapter::new(lake.clone())),
            quality: Arc::new(QualityAdapter::new(lake)),
        }
    }

    /// Replace the adapter serving `adapter.capability()`
    pub fn with_adapter(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        match adapter.capability() {
            Capability::Metadata => self.catalog = adapter,
            Capability::Storage => self.storage = adapter,
            Capability::Lineage => self.lineage = adapter,
            Capability::Quality => self.quality = adapter,
        }
        self
    }

    /// Adapter for a capability
    pub fn adapter(&self, capability: Capability) -> &Arc<dyn ToolAdapter> {
        match capability {
            Capability::Metadata => &self.catalog,
            Capability::Storage => &self.storage,
            Capability::Lineage => &self.lineage,
            Capability::Quality => &self.quality,
        }
    }
}

pub(crate) fn not_found(dataset: &str) -> AppError {
    AppError::DatasetNotFound {
        dataset: dataset.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_boundary_shape() {
        let mut payload = ToolPayload::new();
        payload.insert("last_updated".into(), json!("2024-01-15T12:34:56Z"));
        payload.insert("row_count".into(), json!(42));

        let success = serde_json::to_value(ToolResult::Success(payload)).unwrap();
        assert_eq!(
            success,
            json!({"status": "success", "last_updated": "2024-01-15T12:34:56Z", "row_count": 42})
        );

        let error = serde_json::to_value(ToolResult::Error("Dataset 'x' not found".into())).unwrap();
        assert_eq!(error, json!({"status": "error", "error_message": "Dataset 'x' not found"}));
    }

    #[test]
    fn test_result_conversion() {
        let failed: ToolResult = Err(not_found("orders")).into();
        assert_eq!(failed, ToolResult::Error("Dataset 'orders' not found".into()));
        assert!(!failed.is_success());
    }

    #[test]
    fn test_retarget_dataset() {
        let base = Target::from_config(&RetrievalConfig::default());
        let target = base.with_dataset("sakila.actor");

        assert_eq!(target.database, "sakila");
        assert_eq!(target.prefix, "data/sakila/actor/");
        assert_eq!(target.bucket, "my-bucket");

        let plain = base.with_dataset("orders");
        assert_eq!(plain.database, "default");
        assert_eq!(plain.prefix, "data/orders/");
    }

    #[test]
    fn test_registry_dispatch_covers_every_capability() {
        let registry = ToolRegistry::simulated(Arc::new(SimulatedLake::seeded()));
        for capability in Capability::ALL {
            assert_eq!(registry.adapter(capability).capability(), capability);
        }
    }
}
