//! Seed data for the in-memory engine.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use runguard_engine::fakes::MemoryRunEngine;
use serde::Deserialize;

/// `{"experiments": {"<id>": "<ns>"}, "pipelines": ["<id>"],
/// "pipeline_versions": {"<id>": "<pipeline id>"},
/// "runs": [{"name": "...", "namespace": "..."}]}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub experiments: BTreeMap<String, String>,
    pub pipelines: Vec<String>,
    pub pipeline_versions: BTreeMap<String, String>,
    pub runs: Vec<SeedRun>,
}

#[derive(Debug, Deserialize)]
pub struct SeedRun {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl Fixtures {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse fixtures {}", path.display()))
    }

    /// Load everything into `engine`. Returns the ids of seeded runs.
    pub fn apply(&self, engine: &MemoryRunEngine) -> Vec<String> {
        for (experiment, namespace) in &self.experiments {
            engine.add_experiment(experiment, namespace);
        }
        for pipeline in &self.pipelines {
            engine.add_pipeline(pipeline);
        }
        for (version, pipeline) in &self.pipeline_versions {
            engine.add_pipeline_version(version, pipeline);
        }
        self.runs
            .iter()
            .map(|run| {
                let id = engine.seed_run(&run.name, &run.namespace);
                tracing::debug!(run_id = %id, name = %run.name, "seeded run");
                id
            })
            .collect()
    }
}
