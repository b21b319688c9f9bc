//! Structural and referential checks applied before any mutation.
//!
//! A create request must name a usable execution definition. The direct
//! pipeline spec is tried first; only when it is unusable do we look for
//! a pipeline-version reference. If both fail the caller gets both causes.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use runguard_engine::{
    MetricFormat, MetricItem, NewRun, PipelineSpec, Relationship, ResourceReference, ResourceType,
    RunEngine,
};

use crate::domain::error::{ApiResult, RunApiError};

/// Metric names follow the DNS-label shape.
pub const METRIC_NAME_PATTERN: &str = r"^[a-z]([-a-z0-9]{0,62}[a-z0-9])?$";

const MISSING_PIPELINE: &str = "Please specify a pipeline by providing a (workflow manifest or \
                                pipeline manifest) or (pipeline id or/and pipeline version).";

/// Why a single metric item was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricValidationError {
    #[error("metric name {name:?} must match {}", METRIC_NAME_PATTERN)]
    InvalidName { name: String },

    #[error("metric {name:?} has an empty node id")]
    EmptyNodeId { name: String },

    #[error("metric {name:?} has no value")]
    MissingValue { name: String },

    #[error("metric {name:?} has non-finite value {value}")]
    NonFinite { name: String, value: f64 },

    #[error("percentage metric {name:?} must be within [0, 1], got {value}")]
    PercentageOutOfRange { name: String, value: f64 },
}

fn metric_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(METRIC_NAME_PATTERN) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(
                pattern = METRIC_NAME_PATTERN,
                error = %err,
                "metric name pattern failed to compile, rejecting all metric names"
            );
            None
        }
    })
    .as_ref()
}

/// Shape check for one reported metric. Pure: never touches the engine.
pub fn validate_run_metric(metric: &MetricItem) -> Result<(), MetricValidationError> {
    let name_ok = metric_name_regex().is_some_and(|re| re.is_match(&metric.name));
    if !name_ok {
        return Err(MetricValidationError::InvalidName {
            name: metric.name.clone(),
        });
    }
    if metric.node_id.is_empty() {
        return Err(MetricValidationError::EmptyNodeId {
            name: metric.name.clone(),
        });
    }
    let Some(value) = metric.value else {
        return Err(MetricValidationError::MissingValue {
            name: metric.name.clone(),
        });
    };
    if !value.is_finite() {
        return Err(MetricValidationError::NonFinite {
            name: metric.name.clone(),
            value,
        });
    }
    if metric.format == MetricFormat::Percentage && !(0.0..=1.0).contains(&value) {
        return Err(MetricValidationError::PercentageOutOfRange {
            name: metric.name.clone(),
            value,
        });
    }
    Ok(())
}

/// Create-request validation against the engine's pipeline catalogue.
#[derive(Clone)]
pub struct RequestValidator {
    engine: Arc<dyn RunEngine>,
    max_parameter_bytes: usize,
}

impl RequestValidator {
    pub fn new(engine: Arc<dyn RunEngine>, max_parameter_bytes: usize) -> Self {
        Self {
            engine,
            max_parameter_bytes,
        }
    }

    /// Name first, then pipeline spec, then (only if the pipeline spec failed) the version
    /// reference.
    pub async fn validate_create_run(&self, run: &NewRun) -> ApiResult<()> {
        if run.name.is_empty() {
            return Err(RunApiError::invalid_input(
                "The run name is empty. Please specify a valid name.",
            ));
        }

        let spec_error = match self.validate_pipeline_spec(run.pipeline_spec.as_ref()).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        match self
            .check_pipeline_version_reference(&run.resource_references)
            .await
        {
            Ok(version_id) => {
                tracing::debug!(
                    version_id = %version_id,
                    spec_error = %spec_error,
                    "pipeline spec unusable, using pipeline version reference"
                );
                Ok(())
            }
            Err(version_error) => Err(RunApiError::NoExecutionDefinition {
                spec_error: Box::new(spec_error),
                version_error: Box::new(version_error),
            }),
        }
    }

    /// Direct execution definition check.
    pub async fn validate_pipeline_spec(&self, spec: Option<&PipelineSpec>) -> ApiResult<()> {
        let Some(spec) = spec else {
            return Err(RunApiError::invalid_input(MISSING_PIPELINE));
        };

        let pipeline_id = spec.pipeline_id();
        let workflow = spec.workflow_manifest();
        let manifest = spec.pipeline_manifest();

        match (pipeline_id, workflow, manifest) {
            (None, None, None) => return Err(RunApiError::invalid_input(MISSING_PIPELINE)),
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(RunApiError::invalid_input(
                    "Please either specify a pipeline id or a manifest, not both.",
                ))
            }
            (None, Some(_), Some(_)) => {
                return Err(RunApiError::invalid_input(
                    "Please don't specify a workflow manifest and a pipeline manifest together.",
                ))
            }
            _ => {}
        }

        if let Some(pipeline_id) = pipeline_id {
            self.engine
                .get_pipeline(pipeline_id)
                .await
                .map_err(|e| RunApiError::from(e).context("Get pipelineId failed"))?;
        }

        if let Some(workflow) = workflow {
            let parsed: serde_json::Value = serde_json::from_str(workflow).map_err(|e| {
                RunApiError::invalid_input(format!("Invalid workflow manifest: {}", e))
            })?;
            if !parsed.is_object() {
                return Err(RunApiError::invalid_input(
                    "Invalid workflow manifest: expected a JSON object",
                ));
            }
        }

        let encoded = serde_json::to_string(&spec.parameters).map_err(|e| {
            RunApiError::internal(format!("Failed to serialize pipeline parameters: {}", e))
        })?;
        if encoded.len() > self.max_parameter_bytes {
            return Err(RunApiError::invalid_input(format!(
                "The input parameter length exceed maximum size of {}.",
                self.max_parameter_bytes
            )));
        }
        Ok(())
    }

    /// Fallback execution definition: a `Creator` pipeline-version reference
    /// the engine knows. Returns the version id.
    pub async fn check_pipeline_version_reference(
        &self,
        references: &[ResourceReference],
    ) -> ApiResult<String> {
        let Some(reference) = references.iter().find(|r| {
            r.key.resource_type == ResourceType::PipelineVersion
                && r.relationship == Relationship::Creator
        }) else {
            return Err(RunApiError::invalid_input(
                "Please specify a pipeline version in Run's resource references",
            ));
        };
        if reference.key.id.is_empty() {
            return Err(RunApiError::invalid_input(
                "Pipeline version id is empty in resource references",
            ));
        }
        let version = self
            .engine
            .get_pipeline_version(&reference.key.id)
            .await
            .map_err(|e| RunApiError::from(e).context("Get pipelineVersionId failed"))?;
        Ok(version.id)
    }
}
