//! `RunServer`: the per-operation handlers for the Run resource.
//!
//! Every handler runs the same short-circuiting pipeline:
//! validate (create/report only) → resolve namespace → authorize →
//! delegate to the engine → map the result. Resolution and authorization
//! are skipped entirely in single-tenant mode.

use std::future::Future;
use std::sync::Arc;

use runguard_engine::{RunDetail, RunEngine};
use tracing::Instrument;

use crate::access::AccessGate;
use crate::authz::{Authorizer, CallerContext};
use crate::batch::BatchReporter;
use crate::config::{MetricsReportingAccess, ServerConfig};
use crate::domain::error::{ApiResult, RunApiError};
use crate::domain::list::{validate_filter, validated_list_options};
use crate::domain::request::{
    Ack, CreateRunRequest, ListRunsRequest, ListRunsResponse, ReadArtifactRequest,
    ReadArtifactResponse, ReportRunMetricsRequest, ReportRunMetricsResponse, RunIdRequest,
};
use crate::domain::validation::RequestValidator;
use crate::metrics::METRICS;
use crate::obs;

const AUTHORIZE_STAGE: &str = "Failed to authorize the request";
const VALIDATE_CREATE_STAGE: &str = "Validate create run request failed";

/// Run an operation inside its request span, counting it and logging
/// failures.
async fn traced<T, F>(op: &'static str, caller: &CallerContext, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    METRICS.inc_requests();
    async move {
        let result = fut.await;
        if let Err(err) = &result {
            obs::emit_request_failed(op, err);
        }
        result
    }
    .instrument(obs::request_span(op, caller))
    .await
}

/// Authorization-scoped orchestrator over a [`RunEngine`].
#[derive(Clone)]
pub struct RunServer {
    engine: Arc<dyn RunEngine>,
    config: ServerConfig,
    gate: AccessGate,
    validator: RequestValidator,
    reporter: BatchReporter,
}

impl RunServer {
    pub fn new(
        engine: Arc<dyn RunEngine>,
        authorizer: Arc<dyn Authorizer>,
        config: ServerConfig,
    ) -> Self {
        Self {
            gate: AccessGate::new(config.authorization_mode, engine.clone(), authorizer),
            validator: RequestValidator::new(engine.clone(), config.max_parameter_bytes),
            reporter: BatchReporter::new(engine.clone()),
            engine,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn create_run(
        &self,
        caller: &CallerContext,
        request: CreateRunRequest,
    ) -> ApiResult<RunDetail> {
        traced("create_run", caller, async move {
            let run = request.run;
            self.validator
                .validate_create_run(&run)
                .await
                .map_err(|e| e.context(VALIDATE_CREATE_STAGE))?;
            self.gate
                .authorize_references("create_run", caller, &run.resource_references)
                .await
                .map_err(|e| e.context(AUTHORIZE_STAGE))?;
            self.engine
                .create_run(run)
                .await
                .map_err(|e| RunApiError::from(e).context("Failed to create a new run"))
        })
        .await
    }

    pub async fn get_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<RunDetail> {
        traced("get_run", caller, async move {
            self.authorize_run("get_run", caller, &request.run_id).await?;
            Ok(self.engine.get_run(&request.run_id).await?)
        })
        .await
    }

    pub async fn list_runs(
        &self,
        caller: &CallerContext,
        request: ListRunsRequest,
    ) -> ApiResult<ListRunsResponse> {
        traced("list_runs", caller, async move {
            let opts = validated_list_options(
                &request.page_token,
                request.page_size,
                &request.sort_by,
                &request.filter,
            )?;
            let filter = validate_filter(request.resource_reference_key.as_ref())
                .map_err(|e| e.context("Validating filter failed"))?;
            self.gate
                .authorize_list_filter("list_runs", caller, &filter)
                .await
                .map_err(|e| e.context(AUTHORIZE_STAGE))?;

            let page = self
                .engine
                .list_runs(&filter, &opts)
                .await
                .map_err(|e| RunApiError::from(e).context("Failed to list runs"))?;
            Ok(ListRunsResponse {
                runs: page.runs,
                total_size: page.total_size,
                next_page_token: page.next_page_token,
            })
        })
        .await
    }

    pub async fn archive_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<Ack> {
        traced("archive_run", caller, async move {
            self.authorize_run("archive_run", caller, &request.run_id).await?;
            self.engine.archive_run(&request.run_id).await?;
            Ok(Ack {})
        })
        .await
    }

    pub async fn unarchive_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<Ack> {
        traced("unarchive_run", caller, async move {
            self.authorize_run("unarchive_run", caller, &request.run_id).await?;
            self.engine.unarchive_run(&request.run_id).await?;
            Ok(Ack {})
        })
        .await
    }

    pub async fn delete_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<Ack> {
        traced("delete_run", caller, async move {
            self.authorize_run("delete_run", caller, &request.run_id).await?;
            self.engine.delete_run(&request.run_id).await?;
            Ok(Ack {})
        })
        .await
    }

    pub async fn terminate_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<Ack> {
        traced("terminate_run", caller, async move {
            self.authorize_run("terminate_run", caller, &request.run_id).await?;
            self.engine.terminate_run(&request.run_id).await?;
            Ok(Ack {})
        })
        .await
    }

    pub async fn retry_run(
        &self,
        caller: &CallerContext,
        request: RunIdRequest,
    ) -> ApiResult<Ack> {
        traced("retry_run", caller, async move {
            self.authorize_run("retry_run", caller, &request.run_id).await?;
            self.engine.retry_run(&request.run_id).await?;
            Ok(Ack {})
        })
        .await
    }

    /// Record a batch of metrics. Only a missing run (or, with
    /// `MetricsReportingAccess::Authorized`, a failed authorization) fails
    /// the call; item problems land in the per-item results.
    pub async fn report_run_metrics(
        &self,
        caller: &CallerContext,
        request: ReportRunMetricsRequest,
    ) -> ApiResult<ReportRunMetricsResponse> {
        traced("report_run_metrics", caller, async move {
            if self.config.metrics_reporting == MetricsReportingAccess::Authorized {
                self.authorize_run("report_run_metrics", caller, &request.run_id).await?;
            }
            self.engine.get_run(&request.run_id).await?;
            let results = self.reporter.report(&request.run_id, &request.metrics).await;
            Ok(ReportRunMetricsResponse { results })
        })
        .await
    }

    pub async fn read_artifact(
        &self,
        caller: &CallerContext,
        request: ReadArtifactRequest,
    ) -> ApiResult<ReadArtifactResponse> {
        traced("read_artifact", caller, async move {
            let data = self
                .engine
                .read_artifact(&request.run_id, &request.node_id, &request.artifact_name)
                .await
                .map_err(|e| {
                    RunApiError::from(e).context(format!("failed to read artifact '{:?}'", request))
                })?;
            Ok(ReadArtifactResponse { data })
        })
        .await
    }

    async fn authorize_run(
        &self,
        op: &str,
        caller: &CallerContext,
        run_id: &str,
    ) -> ApiResult<()> {
        self.gate
            .authorize_run(op, caller, run_id)
            .await
            .map_err(|e| e.context(AUTHORIZE_STAGE))
    }
}
