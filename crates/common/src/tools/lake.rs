//! Simulated data lake backing the tool adapters

use crate::errors::{AppError, Result};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One dataset as the catalog, storage, lineage and quality backends see it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnRecord>,
    pub file_format: String,
    pub bucket: String,
    pub prefix: String,
    #[serde(default)]
    pub partition_keys: Vec<String>,
    #[serde(default)]
    pub partition_count: u32,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub total_size_bytes: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub null_rate: f64,
    #[serde(default = "default_checks_passed")]
    pub checks_passed: bool,
    pub producing_service: String,
    pub kafka_topic: String,
    #[serde(default)]
    pub upstream_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    pub data_type: String,
    /// Transformation applied on the way into the lake
    #[serde(default)]
    pub transformation: Option<String>,
}

fn default_checks_passed() -> bool { true }

impl DatasetRecord {
    pub fn column(&self, name: &str) -> Option<&ColumnRecord> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

/// In-memory lake keyed by dataset name
#[derive(Debug, Clone, Default)]
pub struct SimulatedLake {
    datasets: HashMap<String, DatasetRecord>,
}

impl SimulatedLake {
    pub fn from_records(records: Vec<DatasetRecord>) -> Self {
        Self {
            datasets: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    /// Load dataset records from a JSON array file
    pub fn from_json_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading lake fixtures from {}", path))?;
        let records: Vec<DatasetRecord> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration {
                message: format!("invalid lake fixtures in {}: {}", path, e),
            }
        })?;

        tracing::info!(path = path, datasets = records.len(), "Loaded lake fixtures");
        Ok(Self::from_records(records))
    }

    /// Built-in seed: `table1` and `sakila.actor`
    pub fn seeded() -> Self {
        Self::from_records(vec![
            DatasetRecord {
                name: "table1".to_string(),
                database: "default".to_string(),
                table: "table1".to_string(),
                columns: vec![
                    column("id", "bigint", None),
                    column("columnA", "string", Some("trim + lower-case of device_label")),
                    column("value", "double", Some("avg(reading) per minute")),
                ],
                file_format: "parquet".to_string(),
                bucket: "my-bucket".to_string(),
                prefix: "data/table1/".to_string(),
                partition_keys: vec!["dt".to_string()],
                partition_count: 30,
                file_count: 240,
                total_size_bytes: 1_932_735_283,
                last_updated: Utc.with_ymd_and_hms(2024, 1, 15, 12, 34, 56).single().unwrap_or_default(),
                row_count: 12_450_000,
                null_rate: 0.02,
                checks_passed: true,
                producing_service: "IOT API Integration".to_string(),
                kafka_topic: "iot_telemetry".to_string(),
                upstream_sources: vec!["kafka://iot_telemetry".to_string()],
            },
            DatasetRecord {
                name: "sakila.actor".to_string(),
                database: "sakila".to_string(),
                table: "actor".to_string(),
                columns: vec![
                    column("actor_id", "int", None),
                    column("first_name", "string", Some("upper-case normalisation")),
                    column("last_name", "string", Some("upper-case normalisation")),
                    column("last_update", "timestamp", None),
                ],
                file_format: "parquet".to_string(),
                bucket: "my-bucket".to_string(),
                prefix: "data/sakila/actor/".to_string(),
                partition_keys: vec![],
                partition_count: 0,
                file_count: 4,
                total_size_bytes: 18_204,
                last_updated: Utc.with_ymd_and_hms(2025, 11, 12, 3, 24, 0).single().unwrap_or_default(),
                row_count: 200,
                null_rate: 0.0,
                checks_passed: true,
                producing_service: "Sakila CDC Connector".to_string(),
                kafka_topic: "sakila.public.actor".to_string(),
                upstream_sources: vec!["mongodb://sakila/actor".to_string()],
            },
        ])
    }

    /// Look a dataset up by name
    pub fn dataset(&self, name: &str) -> Result<&DatasetRecord> {
        self.datasets
            .get(name)
            .ok_or_else(|| super::not_found(name))
    }

    /// Look a dataset up by its storage location
    pub fn by_location(&self, bucket: &str, prefix: &str) -> Result<&DatasetRecord> {
        let wanted = prefix.trim_end_matches('/');
        self.datasets
            .values()
            .find(|r| r.bucket == bucket && r.prefix.trim_end_matches('/') == wanted)
            .ok_or_else(|| AppError::NotFound {
                resource_type: "storage location".to_string(),
                id: format!("s3://{}/{}", bucket, prefix),
            })
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn column(name: &str, data_type: &str, transformation: Option<&str>) -> ColumnRecord {
    ColumnRecord {
        name: name.to_string(),
        data_type: data_type.to_string(),
        transformation: transformation.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_lookups() {
        let lake = SimulatedLake::seeded();
        assert_eq!(lake.len(), 2);

        let actor = lake.dataset("sakila.actor").unwrap();
        assert_eq!(actor.database, "sakila");
        assert!(actor.column("last_name").is_some());

        let by_location = lake.by_location("my-bucket", "data/table1").unwrap();
        assert_eq!(by_location.name, "table1");
    }

    #[test]
    fn test_missing_dataset() {
        let lake = SimulatedLake::seeded();
        let err = lake.dataset("orders").unwrap_err();
        assert_eq!(err.to_string(), "Dataset 'orders' not found");
        assert!(lake.by_location("other-bucket", "data/table1/").is_err());
    }

    #[test]
    fn test_fixture_file_round_trip() {
        let path = std::env::temp_dir().join(format!("lake-fixtures-{}.json", std::process::id()));
        let records: Vec<DatasetRecord> = SimulatedLake::seeded().datasets.into_values().collect();
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let lake = tokio_test::assert_ok!(SimulatedLake::from_json_file(path.to_str().unwrap()));
        assert_eq!(lake.len(), 2);
        std::fs::remove_file(&path).ok();

        tokio_test::assert_err!(SimulatedLake::from_json_file("/nonexistent/lake.json"));
    }
}
