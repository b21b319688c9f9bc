//! The run engine contract.
//!
//! `RunEngine` is everything the orchestration layer needs from the
//! component that actually persists and executes runs:
//! - run lifecycle (create/get/list/archive/unarchive/delete/terminate/retry)
//! - metric recording and artifact reads
//! - ownership lookups used for authorization (run → namespace,
//!   experiment → namespace)
//! - pipeline / pipeline-version existence checks used by request validation
//!
//! Implementations own all durable state; callers never retry through this
//! trait. An in-memory implementation lives in the `fakes` module.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::list::ListOptions;
use crate::model::{
    FilterContext, MetricItem, NewRun, Pipeline, PipelineVersion, RunDetail, RunPage,
};

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Run persistence and execution backend.
///
/// Guarantees:
/// - Every stored run has a namespace; single-tenant deployments use the
///   empty namespace.
/// - `report_metric` records a given (run, node, metric name) at most once
///   and reports a repeat as `EngineError::DuplicateMetric`.
/// - Missing targets surface as the `*NotFound` variants, never as `Backend`.
#[async_trait]
pub trait RunEngine: Send + Sync {
    /// Persist and submit a new run.
    async fn create_run(&self, run: NewRun) -> EngineResult<RunDetail>;

    /// Fetch a run with its runtime view.
    async fn get_run(&self, run_id: &str) -> EngineResult<RunDetail>;

    /// One page of the runs selected by `filter` and `opts`.
    async fn list_runs(&self, filter: &FilterContext, opts: &ListOptions)
        -> EngineResult<RunPage>;

    async fn archive_run(&self, run_id: &str) -> EngineResult<()>;

    async fn unarchive_run(&self, run_id: &str) -> EngineResult<()>;

    async fn delete_run(&self, run_id: &str) -> EngineResult<()>;

    /// Stop a pending or running run.
    async fn terminate_run(&self, run_id: &str) -> EngineResult<()>;

    /// Resubmit a failed run.
    async fn retry_run(&self, run_id: &str) -> EngineResult<()>;

    /// Record one metric of a run. The metric has already been validated.
    async fn report_metric(&self, run_id: &str, metric: &MetricItem) -> EngineResult<()>;

    /// Raw bytes of an artifact produced by a node of a run.
    async fn read_artifact(
        &self,
        run_id: &str,
        node_id: &str,
        artifact_name: &str,
    ) -> EngineResult<Vec<u8>>;

    /// Namespace owning a run. May be empty for runs created in
    /// single-tenant mode.
    async fn namespace_for_run(&self, run_id: &str) -> EngineResult<String>;

    /// Namespace owning an experiment.
    async fn namespace_for_experiment(&self, experiment_id: &str) -> EngineResult<String>;

    async fn get_pipeline(&self, pipeline_id: &str) -> EngineResult<Pipeline>;

    async fn get_pipeline_version(&self, version_id: &str) -> EngineResult<PipelineVersion>;
}
