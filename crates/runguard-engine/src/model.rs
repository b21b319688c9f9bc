//! Value types exchanged between the orchestration layer and a run engine.
//!
//! All of these are request-scoped: they are built when a request arrives
//! and dropped with the response. None of them own external resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resource references
// ---------------------------------------------------------------------------

/// Kind of resource a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Namespace,
    Experiment,
    /// Legacy spelling of `Experiment`, still accepted from older clients.
    #[serde(rename = "ExperimentUUID")]
    ExperimentUuid,
    Job,
    PipelineVersion,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResourceType {
    /// `Experiment` and its legacy alias `ExperimentUUID`.
    pub fn is_experiment(self) -> bool {
        matches!(self, ResourceType::Experiment | ResourceType::ExperimentUuid)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::Namespace => "NAMESPACE",
            ResourceType::Experiment => "EXPERIMENT",
            ResourceType::ExperimentUuid => "ExperimentUUID",
            ResourceType::Job => "JOB",
            ResourceType::PipelineVersion => "PIPELINE_VERSION",
            ResourceType::Unknown => "UNKNOWN_RESOURCE_TYPE",
        };
        f.write_str(s)
    }
}

/// A typed `(kind, id)` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceKey {
    #[serde(rename = "type", default)]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub id: String,
}

impl ResourceKey {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }

    pub fn namespace(id: impl Into<String>) -> Self {
        Self::new(ResourceType::Namespace, id)
    }

    pub fn experiment(id: impl Into<String>) -> Self {
        Self::new(ResourceType::Experiment, id)
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{type: {}, id: {:?}}}", self.resource_type, self.id)
    }
}

/// How a referenced resource relates to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    Owner,
    Creator,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A resource key qualified by its relationship to the run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceReference {
    pub key: ResourceKey,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relationship: Relationship,
}

impl ResourceReference {
    pub fn owner(key: ResourceKey) -> Self {
        Self {
            key,
            name: String::new(),
            relationship: Relationship::Owner,
        }
    }

    pub fn creator(key: ResourceKey) -> Self {
        Self {
            key,
            name: String::new(),
            relationship: Relationship::Creator,
        }
    }
}

/// Authorization-relevant part of a list request.
///
/// Holds at most one reference key; the remaining list criteria travel in
/// [`crate::ListOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterContext {
    pub reference_key: Option<ResourceKey>,
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// A named pipeline parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Direct execution definition of a run.
///
/// Exactly one of `pipeline_id`, `workflow_manifest` and
/// `pipeline_manifest` should identify the pipeline. Empty strings count
/// as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub workflow_manifest: Option<String>,
    #[serde(default)]
    pub pipeline_manifest: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl PipelineSpec {
    pub fn pipeline_id(&self) -> Option<&str> {
        present(&self.pipeline_id)
    }

    pub fn workflow_manifest(&self) -> Option<&str> {
        present(&self.workflow_manifest)
    }

    pub fn pipeline_manifest(&self) -> Option<&str> {
        present(&self.pipeline_manifest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineVersion {
    pub id: String,
    pub name: String,
    pub pipeline_id: String,
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageState {
    #[default]
    Available,
    Archived,
}

/// Execution status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Display format of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricFormat {
    Raw,
    Percentage,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// One metric reported against a node of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub format: MetricFormat,
}

impl MetricItem {
    pub fn new(name: impl Into<String>, node_id: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            node_id: node_id.into(),
            value: Some(value),
            format: MetricFormat::Raw,
        }
    }

    pub fn with_format(mut self, format: MetricFormat) -> Self {
        self.format = format;
        self
    }
}

/// Caller-supplied description of a run to create.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewRun {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pipeline_spec: Option<PipelineSpec>,
    #[serde(default)]
    pub resource_references: Vec<ResourceReference>,
}

/// A run as stored by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub pipeline_spec: Option<PipelineSpec>,
    pub resource_references: Vec<ResourceReference>,
    pub storage_state: StorageState,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metrics: Vec<MetricItem>,
    pub error: Option<String>,
}

impl Run {
    /// Build a freshly-submitted run from a creation request.
    pub fn from_new(new_run: NewRun) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_run.name,
            description: new_run.description,
            pipeline_spec: new_run.pipeline_spec,
            resource_references: new_run.resource_references,
            storage_state: StorageState::Available,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            scheduled_at: None,
            finished_at: None,
            metrics: Vec::new(),
            error: None,
        }
    }
}

/// Runtime view of a run's execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineRuntime {
    pub workflow_manifest: Option<String>,
}

/// A run together with its runtime view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    pub run: Run,
    pub pipeline_runtime: PipelineRuntime,
}

/// One page of a run listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunPage {
    pub runs: Vec<Run>,
    pub total_size: usize,
    /// Empty when there are no further pages.
    pub next_page_token: String,
}
