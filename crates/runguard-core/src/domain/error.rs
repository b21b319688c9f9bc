//! Request-level error taxonomy for runguard.

use runguard_engine::EngineError;
use serde::{Deserialize, Serialize};

/// Category of a failed request, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing fields, unresolvable references, bad list criteria.
    InvalidInput,
    /// The caller lacks rights on the resolved namespace.
    AuthorizationDenied,
    /// The target run/experiment/pipeline does not exist.
    NotFound,
    /// Invariant violation or backend fault.
    Internal,
}

/// Errors returned by `RunServer` operations.
#[derive(Debug, thiserror::Error)]
pub enum RunApiError {
    #[error("{0}")]
    InvalidInput(String),

    /// Display never carries the policy's reason; it is only logged.
    #[error("not authorized")]
    AuthorizationDenied,

    #[error("{0}")]
    Internal(String),

    /// Neither execution definition of a create request was usable.
    #[error(
        "Neither pipeline spec nor pipeline version is valid. \
         Pipeline spec: {spec_error}. Pipeline version: {version_error}"
    )]
    NoExecutionDefinition {
        spec_error: Box<RunApiError>,
        version_error: Box<RunApiError>,
    },

    /// A stage label wrapped around an underlying failure.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<RunApiError>,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RunApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RunApiError::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RunApiError::Internal(message.into())
    }

    /// Wrap with a stage label. The kind of the wrapped error is kept.
    pub fn context(self, context: impl Into<String>) -> Self {
        RunApiError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RunApiError::InvalidInput(_) | RunApiError::NoExecutionDefinition { .. } => {
                ErrorKind::InvalidInput
            }
            RunApiError::AuthorizationDenied => ErrorKind::AuthorizationDenied,
            RunApiError::Internal(_) => ErrorKind::Internal,
            RunApiError::Context { source, .. } => source.kind(),
            RunApiError::Engine(err) => engine_error_kind(err),
        }
    }

    /// Innermost error beneath any stage labels.
    pub fn root(&self) -> &RunApiError {
        match self {
            RunApiError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

fn engine_error_kind(err: &EngineError) -> ErrorKind {
    match err {
        e if e.is_not_found() => ErrorKind::NotFound,
        EngineError::InvalidRunState { .. }
        | EngineError::InvalidPageToken { .. }
        | EngineError::DuplicateMetric { .. } => ErrorKind::InvalidInput,
        _ => ErrorKind::Internal,
    }
}

/// Result type for runguard operations.
pub type ApiResult<T> = std::result::Result<T, RunApiError>;
