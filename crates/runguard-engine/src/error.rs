//! Error types for runguard-engine

use thiserror::Error;

/// Errors reported by a run engine backend.
///
/// These are the engine's own failures. The orchestration layer forwards
/// them unchanged wherever it delegates directly to the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No run exists with this ID
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// No experiment exists with this ID
    #[error("experiment not found: {experiment_id}")]
    ExperimentNotFound { experiment_id: String },

    /// No pipeline exists with this ID
    #[error("pipeline not found: {pipeline_id}")]
    PipelineNotFound { pipeline_id: String },

    /// No pipeline version exists with this ID
    #[error("pipeline version not found: {version_id}")]
    PipelineVersionNotFound { version_id: String },

    /// The run exists but holds no such artifact
    #[error("artifact {artifact_name} not found on node {node_id} of run {run_id}")]
    ArtifactNotFound {
        run_id: String,
        node_id: String,
        artifact_name: String,
    },

    /// A metric with the same (node, name) was already recorded for the run
    #[error("metric {name} of node {node_id} already reported for run {run_id}")]
    DuplicateMetric {
        run_id: String,
        node_id: String,
        name: String,
    },

    /// The requested lifecycle transition is not valid from the current status
    #[error("run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    /// Page token could not be decoded
    #[error("invalid page token: {reason}")]
    InvalidPageToken { reason: String },

    /// Backend failure (storage, execution controller, ...)
    #[error("engine backend failure: {0}")]
    Backend(String),
}

impl EngineError {
    /// Returns `true` for the "target does not exist" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::RunNotFound { .. }
                | EngineError::ExperimentNotFound { .. }
                | EngineError::PipelineNotFound { .. }
                | EngineError::PipelineVersionNotFound { .. }
                | EngineError::ArtifactNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidPageToken {
            reason: err.to_string(),
        }
    }
}

impl From<hex::FromHexError> for EngineError {
    fn from(err: hex::FromHexError) -> Self {
        EngineError::InvalidPageToken {
            reason: err.to_string(),
        }
    }
}
