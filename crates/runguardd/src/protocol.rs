//! JSON-lines request protocol.
//!
//! Each input line is one object: `{"caller": "<identity>", "op": "<op>", ...}`
//! where the remaining fields are the operation's request. Each output line
//! is `{"ok": <result>}` or `{"error": {"kind": ..., "message": ...}}`.

use runguard_core::{
    ApiResult, CallerContext, CreateRunRequest, ErrorKind, ListRunsRequest, ReadArtifactRequest,
    ReportRunMetricsRequest, RunApiError, RunIdRequest, RunServer,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateRun(CreateRunRequest),
    GetRun(RunIdRequest),
    ListRuns(ListRunsRequest),
    ArchiveRun(RunIdRequest),
    UnarchiveRun(RunIdRequest),
    DeleteRun(RunIdRequest),
    TerminateRun(RunIdRequest),
    RetryRun(RunIdRequest),
    ReportRunMetrics(ReportRunMetricsRequest),
    ReadArtifact(ReadArtifactRequest),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Ok(Value),
    Error(ErrorBody),
}

impl From<RunApiError> for Reply {
    fn from(err: RunApiError) -> Self {
        Reply::Error(ErrorBody {
            kind: err.kind(),
            message: err.to_string(),
        })
    }
}

/// Split a raw line into caller and operation.
pub fn parse_line(line: &str) -> ApiResult<(CallerContext, Operation)> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| RunApiError::invalid_input(format!("Malformed request: {}", e)))?;
    let caller = match value.get("caller").and_then(Value::as_str) {
        Some(identity) if !identity.is_empty() => CallerContext::new(identity),
        _ => CallerContext::anonymous(),
    };
    let op = serde_json::from_value(value)
        .map_err(|e| RunApiError::invalid_input(format!("Malformed request: {}", e)))?;
    Ok((caller, op))
}

fn to_value<T: Serialize>(result: ApiResult<T>) -> ApiResult<Value> {
    let result = result?;
    serde_json::to_value(result)
        .map_err(|e| RunApiError::internal(format!("Failed to encode response: {}", e)))
}

pub async fn dispatch(
    server: &RunServer,
    caller: &CallerContext,
    op: Operation,
) -> ApiResult<Value> {
    match op {
        Operation::CreateRun(req) => to_value(server.create_run(caller, req).await),
        Operation::GetRun(req) => to_value(server.get_run(caller, req).await),
        Operation::ListRuns(req) => to_value(server.list_runs(caller, req).await),
        Operation::ArchiveRun(req) => to_value(server.archive_run(caller, req).await),
        Operation::UnarchiveRun(req) => to_value(server.unarchive_run(caller, req).await),
        Operation::DeleteRun(req) => to_value(server.delete_run(caller, req).await),
        Operation::TerminateRun(req) => to_value(server.terminate_run(caller, req).await),
        Operation::RetryRun(req) => to_value(server.retry_run(caller, req).await),
        Operation::ReportRunMetrics(req) => to_value(server.report_run_metrics(caller, req).await),
        Operation::ReadArtifact(req) => to_value(server.read_artifact(caller, req).await),
    }
}

/// Handle one input line and render the reply line.
pub async fn handle_line(server: &RunServer, line: &str) -> String {
    let reply = match parse_line(line) {
        Ok((caller, op)) => match dispatch(server, &caller, op).await {
            Ok(value) => Reply::Ok(value),
            Err(err) => Reply::from(err),
        },
        Err(err) => {
            tracing::debug!(error = %err, "rejected malformed line");
            Reply::from(err)
        }
    };
    serde_json::to_string(&reply).unwrap_or_else(|e| {
        format!(
            r#"{{"error":{{"kind":"internal","message":"failed to encode reply: {}"}}}}"#,
            e
        )
    })
}
