//! Evidence Normalizer - flattens tool payloads into source/snippet records

use crate::tools::ToolPayload;
use serde::Serialize;
use serde_json::Value;

/// A single piece of evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceRecord {
    /// Dotted origin path, e.g. `glue.table1.last_updated`
    pub source: String,

    /// Stringified value
    pub snippet: String,
}

/// Ordered evidence; empty means "no evidence available", not failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EvidenceList(Vec<EvidenceRecord>);

impl EvidenceList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EvidenceRecord> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: EvidenceList) {
        self.0.extend(other.0);
    }

    /// Source identifiers in order
    pub fn sources(&self) -> Vec<String> {
        self.0.iter().map(|r| r.source.clone()).collect()
    }
}

impl From<Vec<EvidenceRecord>> for EvidenceList {
    fn from(records: Vec<EvidenceRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a EvidenceList {
    type Item = &'a EvidenceRecord;
    type IntoIter = std::slice::Iter<'a, EvidenceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Convert a tool payload into evidence, one record per key in map order
pub fn normalize(prefix: &str, data: &ToolPayload) -> EvidenceList {
    data.iter()
        .map(|(key, value)| EvidenceRecord {
            source: format!("{}.{}", prefix, key),
            snippet: stringify(value),
        })
        .collect::<Vec<_>>()
        .into()
}

/// Strings verbatim, everything else as JSON text
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
