//! Response types for CLI commands
//!
//! JSON output is always a [`JsonResponse`] envelope:
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "execution_id": "5f0c2b9e-...",
//!   "tool": "edithist",
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "data": { ... }
//! }
//! ```
//!
//! Offsets inside payloads are character offsets, matching the operation log.

use serde::{Deserialize, Serialize};

use crate::graph::GraphStats;
use crate::operation::{Operation, Timestamp};
use crate::restore::ConsistencyReport;

/// Current JSON output schema version
pub const EDITHIST_JSON_SCHEMA_VERSION: &str = "1.0.0";

/// Wrapper for all JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub schema_version: String,
    /// Unique id of this run
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// RFC 3339, second precision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub data: T,
    /// Set when the command stopped early (e.g. cancelled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

impl<T> JsonResponse<T> {
    pub fn new(data: T, execution_id: &str) -> Self {
        JsonResponse {
            schema_version: EDITHIST_JSON_SCHEMA_VERSION.to_string(),
            execution_id: execution_id.to_string(),
            tool: Some("edithist".to_string()),
            timestamp: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            data,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = Some(partial);
        self
    }
}

/// Response for errors in JSON mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (`EH-...`), when the failure has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub error: String,
    pub message: String,
}

/// `restore` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub path: String,
    pub index: usize,
    pub time: Timestamp,
    /// Index of the snapshot the text was replayed from
    pub restoration_point: Option<usize>,
    pub code: String,
}

/// `check` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub files: usize,
    pub clean: bool,
    pub total_issues: usize,
    pub reports: Vec<ConsistencyReport>,
}

/// `graph` payload in JSON mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub project: String,
    pub files: Vec<String>,
    pub stats: GraphStats,
    /// Rendered graph in the requested export format
    pub export: serde_json::Value,
}

/// One operation of a slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceEntry {
    pub key: String,
    pub operation: Operation,
}

/// `slice` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceResponse {
    pub title: String,
    pub direction: String,
    pub count: usize,
    pub time_span: Option<(Timestamp, Timestamp)>,
    pub operations: Vec<SliceEntry>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// Compact JSON
    Json,
    /// Indented JSON
    Pretty,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Some(OutputFormat::Human),
            "json" => Some(OutputFormat::Json),
            "pretty" => Some(OutputFormat::Pretty),
            _ => None,
        }
    }

    pub fn is_json(self) -> bool {
        !matches!(self, OutputFormat::Human)
    }
}

pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Print `data` as JSON on stdout
pub fn output_json<T: Serialize>(data: &T, format: OutputFormat) -> anyhow::Result<()> {
    let json = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(data)?,
        _ => serde_json::to_string(data)?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("text"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("pretty"), Some(OutputFormat::Pretty));
        assert_eq!(OutputFormat::from_str("yaml"), None);
        assert!(!OutputFormat::Human.is_json());
    }

    #[test]
    fn test_envelope_fields() {
        let id = generate_execution_id();
        let response = JsonResponse::new(42, &id).with_partial(true);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["schema_version"], EDITHIST_JSON_SCHEMA_VERSION);
        assert_eq!(value["execution_id"], id.as_str());
        assert_eq!(value["tool"], "edithist");
        assert_eq!(value["data"], 42);
        assert_eq!(value["partial"], true);
    }

    #[test]
    fn test_execution_ids_are_unique() {
        assert_ne!(generate_execution_id(), generate_execution_id());
    }
}
