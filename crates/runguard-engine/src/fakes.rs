//! In-memory fakes for the engine contract (testing and local runs)
//!
//! `MemoryRunEngine` satisfies the `RunEngine` guarantees without any
//! external dependencies and counts calls per operation so tests can
//! assert that a request never reached the engine.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::engine_traits::{EngineResult, RunEngine};
use crate::error::EngineError;
use crate::list::{compare_field_values, ListOptions};
use crate::model::*;

#[derive(Debug)]
struct StoredRun {
    run: Run,
    namespace: String,
    /// (node_id, artifact_name) → bytes
    artifacts: HashMap<(String, String), Vec<u8>>,
}

#[derive(Debug, Default)]
struct EngineState {
    runs: HashMap<String, StoredRun>,
    experiments: HashMap<String, String>,
    pipelines: HashMap<String, Pipeline>,
    versions: HashMap<String, PipelineVersion>,
}

/// In-memory run engine backed by `HashMap`s behind a `Mutex`.
#[derive(Debug, Default)]
pub struct MemoryRunEngine {
    state: Mutex<EngineState>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryRunEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an experiment owned by `namespace`.
    pub fn with_experiment(self, experiment_id: &str, namespace: &str) -> Self {
        self.add_experiment(experiment_id, namespace);
        self
    }

    pub fn with_pipeline(self, pipeline_id: &str) -> Self {
        self.add_pipeline(pipeline_id);
        self
    }

    pub fn with_pipeline_version(self, version_id: &str, pipeline_id: &str) -> Self {
        self.add_pipeline_version(version_id, pipeline_id);
        self
    }

    pub fn add_experiment(&self, experiment_id: &str, namespace: &str) {
        self.state()
            .experiments
            .insert(experiment_id.to_string(), namespace.to_string());
    }

    pub fn add_pipeline(&self, pipeline_id: &str) {
        self.state().pipelines.insert(
            pipeline_id.to_string(),
            Pipeline {
                id: pipeline_id.to_string(),
                name: pipeline_id.to_string(),
            },
        );
    }

    pub fn add_pipeline_version(&self, version_id: &str, pipeline_id: &str) {
        self.state().versions.insert(
            version_id.to_string(),
            PipelineVersion {
                id: version_id.to_string(),
                name: version_id.to_string(),
                pipeline_id: pipeline_id.to_string(),
            },
        );
    }

    /// Store a run directly, bypassing `create_run`. Returns its ID.
    pub fn insert_run(&self, run: Run, namespace: &str) -> String {
        let run_id = run.id.clone();
        self.state().runs.insert(
            run_id.clone(),
            StoredRun {
                run,
                namespace: namespace.to_string(),
                artifacts: HashMap::new(),
            },
        );
        run_id
    }

    /// Store a pending run named `name` in `namespace`. Returns its ID.
    pub fn seed_run(&self, name: &str, namespace: &str) -> String {
        let run = Run::from_new(NewRun {
            name: name.to_string(),
            ..Default::default()
        });
        self.insert_run(run, namespace)
    }

    pub fn set_status(&self, run_id: &str, status: RunStatus) -> EngineResult<()> {
        let mut state = self.state();
        let stored = Self::stored_mut(&mut state, run_id)?;
        stored.run.status = status;
        Ok(())
    }

    pub fn put_artifact(
        &self,
        run_id: &str,
        node_id: &str,
        artifact_name: &str,
        data: &[u8],
    ) -> EngineResult<()> {
        let mut state = self.state();
        let stored = Self::stored_mut(&mut state, run_id)?;
        stored.artifacts.insert(
            (node_id.to_string(), artifact_name.to_string()),
            data.to_vec(),
        );
        Ok(())
    }

    /// Snapshot of a stored run, if present.
    pub fn run(&self, run_id: &str) -> Option<Run> {
        self.state().runs.get(run_id).map(|s| s.run.clone())
    }

    /// How many times `operation` (the trait method name) was called.
    pub fn calls_to(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of trait calls received.
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    fn record(&self, operation: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default() += 1;
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stored_mut<'a>(state: &'a mut EngineState, run_id: &str) -> EngineResult<&'a mut StoredRun> {
        state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    /// Namespace a new run lands in: an owning namespace reference wins,
    /// then an owning experiment's namespace, else the empty namespace.
    fn namespace_for_new_run(state: &EngineState, run: &NewRun) -> EngineResult<String> {
        let owners = run
            .resource_references
            .iter()
            .filter(|r| r.relationship == Relationship::Owner);
        let mut namespace = String::new();
        for reference in owners {
            match reference.key.resource_type {
                ResourceType::Namespace => return Ok(reference.key.id.clone()),
                t if t.is_experiment() => {
                    namespace = state
                        .experiments
                        .get(&reference.key.id)
                        .cloned()
                        .ok_or_else(|| EngineError::ExperimentNotFound {
                            experiment_id: reference.key.id.clone(),
                        })?;
                }
                _ => {}
            }
        }
        Ok(namespace)
    }
}

/// Value of a filterable/sortable field of a run.
fn run_field(run: &Run, key: &str) -> Option<Value> {
    if let Some(metric_name) = key.strip_prefix("metric:") {
        return run
            .metrics
            .iter()
            .find(|m| m.name == metric_name)
            .and_then(|m| m.value)
            .map(Value::from);
    }
    match key {
        "id" => Some(Value::from(run.id.clone())),
        "name" => Some(Value::from(run.name.clone())),
        "description" => Some(run.description.clone().map(Value::from).unwrap_or(Value::Null)),
        "created_at" => Some(Value::from(run.created_at.timestamp())),
        "scheduled_at" => Some(
            run.scheduled_at
                .map(|t| Value::from(t.timestamp()))
                .unwrap_or(Value::Null),
        ),
        "storage_state" => serde_json::to_value(run.storage_state).ok(),
        "status" => serde_json::to_value(run.status).ok(),
        _ => None,
    }
}

fn in_scope(stored: &StoredRun, filter: &FilterContext) -> EngineResult<bool> {
    let Some(key) = &filter.reference_key else {
        return Ok(true);
    };
    let references = &stored.run.resource_references;
    Ok(match key.resource_type {
        ResourceType::Namespace => stored.namespace == key.id,
        t if t.is_experiment() => references
            .iter()
            .any(|r| r.key.resource_type.is_experiment() && r.key.id == key.id),
        ResourceType::Job | ResourceType::PipelineVersion => references
            .iter()
            .any(|r| r.key.resource_type == key.resource_type && r.key.id == key.id),
        _ => {
            return Err(EngineError::Backend(format!(
                "unsupported reference filter {}",
                key
            )))
        }
    })
}

fn check_status(run: &Run, allowed: &[RunStatus], expected: &str) -> EngineResult<()> {
    if allowed.contains(&run.status) {
        Ok(())
    } else {
        Err(EngineError::InvalidRunState {
            run_id: run.id.clone(),
            status: run.status.to_string(),
            expected: expected.to_string(),
        })
    }
}

#[async_trait]
impl RunEngine for MemoryRunEngine {
    async fn create_run(&self, new_run: NewRun) -> EngineResult<RunDetail> {
        self.record("create_run");
        let mut state = self.state();
        let namespace = Self::namespace_for_new_run(&state, &new_run)?;
        let workflow_manifest = new_run.pipeline_spec.as_ref().and_then(|spec| {
            spec.workflow_manifest()
                .or(spec.pipeline_manifest())
                .map(str::to_string)
        });
        let mut run = Run::from_new(new_run);
        run.status = RunStatus::Running;
        run.scheduled_at = Some(run.created_at);
        let detail = RunDetail {
            run: run.clone(),
            pipeline_runtime: PipelineRuntime { workflow_manifest },
        };
        state.runs.insert(
            run.id.clone(),
            StoredRun {
                run,
                namespace,
                artifacts: HashMap::new(),
            },
        );
        Ok(detail)
    }

    async fn get_run(&self, run_id: &str) -> EngineResult<RunDetail> {
        self.record("get_run");
        let state = self.state();
        let stored = state
            .runs
            .get(run_id)
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        Ok(RunDetail {
            run: stored.run.clone(),
            pipeline_runtime: PipelineRuntime {
                workflow_manifest: stored.run.pipeline_spec.as_ref().and_then(|spec| {
                    spec.workflow_manifest()
                        .or(spec.pipeline_manifest())
                        .map(str::to_string)
                }),
            },
        })
    }

    async fn list_runs(
        &self,
        filter: &FilterContext,
        opts: &ListOptions,
    ) -> EngineResult<RunPage> {
        self.record("list_runs");
        let state = self.state();
        let mut selected = Vec::new();
        for stored in state.runs.values() {
            if !in_scope(stored, filter)? {
                continue;
            }
            let matches_filter = opts
                .filter
                .predicates
                .iter()
                .all(|p| p.matches(run_field(&stored.run, &p.key).as_ref()));
            if matches_filter {
                selected.push(stored.run.clone());
            }
        }

        selected.sort_by(|a, b| {
            let ordering = compare_field_values(
                &run_field(a, &opts.sort.field).unwrap_or(Value::Null),
                &run_field(b, &opts.sort.field).unwrap_or(Value::Null),
            )
            .then_with(|| a.id.cmp(&b.id));
            if opts.sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let total_size = selected.len();
        let runs: Vec<Run> = selected
            .into_iter()
            .skip(opts.offset)
            .take(opts.page_size)
            .collect();
        let next_page_token = opts.next_page_token(runs.len(), total_size);
        Ok(RunPage {
            runs,
            total_size,
            next_page_token,
        })
    }

    async fn archive_run(&self, run_id: &str) -> EngineResult<()> {
        self.record("archive_run");
        let mut state = self.state();
        Self::stored_mut(&mut state, run_id)?.run.storage_state = StorageState::Archived;
        Ok(())
    }

    async fn unarchive_run(&self, run_id: &str) -> EngineResult<()> {
        self.record("unarchive_run");
        let mut state = self.state();
        Self::stored_mut(&mut state, run_id)?.run.storage_state = StorageState::Available;
        Ok(())
    }

    async fn delete_run(&self, run_id: &str) -> EngineResult<()> {
        self.record("delete_run");
        let mut state = self.state();
        state
            .runs
            .remove(run_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    async fn terminate_run(&self, run_id: &str) -> EngineResult<()> {
        self.record("terminate_run");
        let mut state = self.state();
        let run = &mut Self::stored_mut(&mut state, run_id)?.run;
        check_status(
            run,
            &[RunStatus::Pending, RunStatus::Running],
            "Pending or Running",
        )?;
        run.status = RunStatus::Failed;
        run.error = Some("run terminated".to_string());
        run.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn retry_run(&self, run_id: &str) -> EngineResult<()> {
        self.record("retry_run");
        let mut state = self.state();
        let run = &mut Self::stored_mut(&mut state, run_id)?.run;
        check_status(run, &[RunStatus::Failed, RunStatus::Error], "Failed or Error")?;
        run.status = RunStatus::Running;
        run.error = None;
        run.finished_at = None;
        Ok(())
    }

    async fn report_metric(&self, run_id: &str, metric: &MetricItem) -> EngineResult<()> {
        self.record("report_metric");
        let mut state = self.state();
        let run = &mut Self::stored_mut(&mut state, run_id)?.run;
        let duplicate = run
            .metrics
            .iter()
            .any(|m| m.node_id == metric.node_id && m.name == metric.name);
        if duplicate {
            return Err(EngineError::DuplicateMetric {
                run_id: run_id.to_string(),
                node_id: metric.node_id.clone(),
                name: metric.name.clone(),
            });
        }
        run.metrics.push(metric.clone());
        Ok(())
    }

    async fn read_artifact(
        &self,
        run_id: &str,
        node_id: &str,
        artifact_name: &str,
    ) -> EngineResult<Vec<u8>> {
        self.record("read_artifact");
        let state = self.state();
        let stored = state
            .runs
            .get(run_id)
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        stored
            .artifacts
            .get(&(node_id.to_string(), artifact_name.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::ArtifactNotFound {
                run_id: run_id.to_string(),
                node_id: node_id.to_string(),
                artifact_name: artifact_name.to_string(),
            })
    }

    async fn namespace_for_run(&self, run_id: &str) -> EngineResult<String> {
        self.record("namespace_for_run");
        let state = self.state();
        state
            .runs
            .get(run_id)
            .map(|s| s.namespace.clone())
            .ok_or_else(|| EngineError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    async fn namespace_for_experiment(&self, experiment_id: &str) -> EngineResult<String> {
        self.record("namespace_for_experiment");
        let state = self.state();
        state
            .experiments
            .get(experiment_id)
            .cloned()
            .ok_or_else(|| EngineError::ExperimentNotFound {
                experiment_id: experiment_id.to_string(),
            })
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> EngineResult<Pipeline> {
        self.record("get_pipeline");
        let state = self.state();
        state
            .pipelines
            .get(pipeline_id)
            .cloned()
            .ok_or_else(|| EngineError::PipelineNotFound {
                pipeline_id: pipeline_id.to_string(),
            })
    }

    async fn get_pipeline_version(&self, version_id: &str) -> EngineResult<PipelineVersion> {
        self.record("get_pipeline_version");
        let state = self.state();
        state
            .versions
            .get(version_id)
            .cloned()
            .ok_or_else(|| EngineError::PipelineVersionNotFound {
                version_id: version_id.to_string(),
            })
    }
}
