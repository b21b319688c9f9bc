//! Request and response shapes of the Run operations.

use runguard_engine::{MetricItem, NewRun, ResourceKey, Run};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateRunRequest {
    pub run: NewRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdRequest {
    pub run_id: String,
}

impl RunIdRequest {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListRunsRequest {
    #[serde(default)]
    pub page_token: String,
    #[serde(default)]
    pub page_size: i32,
    /// `"<field>"`, `"<field> asc"` or `"<field> desc"`.
    #[serde(default)]
    pub sort_by: String,
    /// JSON-encoded filter, `{"predicates": [...]}`.
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub resource_reference_key: Option<ResourceKey>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListRunsResponse {
    pub runs: Vec<Run>,
    pub total_size: usize,
    pub next_page_token: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportRunMetricsRequest {
    pub run_id: String,
    #[serde(default)]
    pub metrics: Vec<MetricItem>,
}

/// Why a metric item was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricErrorStatus {
    InvalidArgument,
    InternalError,
}

/// Per-item verdict of a metrics report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetricOutcome {
    Ok,
    /// Already recorded earlier; not recorded again.
    Skipped { message: String },
    Error {
        status: MetricErrorStatus,
        message: String,
    },
}

impl MetricOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, MetricOutcome::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MetricOutcome::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name: String,
    pub node_id: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

/// One result per submitted metric, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportRunMetricsResponse {
    pub results: Vec<MetricResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadArtifactRequest {
    pub run_id: String,
    pub node_id: String,
    pub artifact_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadArtifactResponse {
    pub data: Vec<u8>,
}

/// Empty acknowledgment of a mutating single-run operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_result_serializes_flat() {
        let result = MetricResult {
            name: "accuracy".into(),
            node_id: "node-1".into(),
            outcome: MetricOutcome::Error {
                status: MetricErrorStatus::InvalidArgument,
                message: "bad name".into(),
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["status"], "INVALID_ARGUMENT");
        assert_eq!(value["node_id"], "node-1");
    }

    #[test]
    fn list_request_defaults() {
        let req: ListRunsRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.page_size, 0);
        assert!(req.resource_reference_key.is_none());
    }
}
