//! Partial-failure metric reporting.
//!
//! Items are handled strictly in input order, one at a time. Each item's
//! outcome is captured locally, so a bad item never stops the ones after
//! it and the batch as a whole never fails.

use std::sync::Arc;

use runguard_engine::{EngineError, MetricItem, RunEngine};

use crate::domain::request::{MetricErrorStatus, MetricOutcome, MetricResult};
use crate::domain::validation::validate_run_metric;
use crate::metrics::METRICS;
use crate::obs;

/// Records a batch of metrics against one existing run.
#[derive(Clone)]
pub struct BatchReporter {
    engine: Arc<dyn RunEngine>,
}

impl BatchReporter {
    pub fn new(engine: Arc<dyn RunEngine>) -> Self {
        Self { engine }
    }

    /// One result per item, same order, same length.
    pub async fn report(&self, run_id: &str, metrics: &[MetricItem]) -> Vec<MetricResult> {
        let mut results = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let outcome = self.report_one(run_id, metric).await;
            results.push(MetricResult {
                name: metric.name.clone(),
                node_id: metric.node_id.clone(),
                outcome,
            });
        }

        let recorded = results.iter().filter(|r| r.outcome.is_ok()).count();
        let failed = results.iter().filter(|r| r.outcome.is_error()).count();
        METRICS.add_metric_items(recorded as u64, failed as u64);
        obs::emit_metrics_reported(run_id, results.len(), recorded, failed);
        results
    }

    async fn report_one(&self, run_id: &str, metric: &MetricItem) -> MetricOutcome {
        if let Err(err) = validate_run_metric(metric) {
            return MetricOutcome::Error {
                status: MetricErrorStatus::InvalidArgument,
                message: err.to_string(),
            };
        }
        match self.engine.report_metric(run_id, metric).await {
            Ok(()) => MetricOutcome::Ok,
            Err(err @ EngineError::DuplicateMetric { .. }) => MetricOutcome::Skipped {
                message: err.to_string(),
            },
            Err(err) => {
                tracing::warn!(
                    run_id = %run_id,
                    metric = %metric.name,
                    node_id = %metric.node_id,
                    error = %err,
                    "failed to record metric"
                );
                MetricOutcome::Error {
                    status: MetricErrorStatus::InternalError,
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runguard_engine::fakes::MemoryRunEngine;

    #[tokio::test]
    async fn empty_batch_yields_no_results() {
        let engine = Arc::new(MemoryRunEngine::new());
        let run_id = engine.seed_run("r", "");
        let results = BatchReporter::new(engine.clone()).report(&run_id, &[]).await;
        assert!(results.is_empty());
        assert_eq!(engine.calls_to("report_metric"), 0);
    }

    #[tokio::test]
    async fn invalid_items_never_reach_engine() {
        let engine = Arc::new(MemoryRunEngine::new());
        let run_id = engine.seed_run("r", "");
        let results = BatchReporter::new(engine.clone())
            .report(&run_id, &[MetricItem::new("Bad Name", "n", 1.0)])
            .await;
        assert!(matches!(
            results[0].outcome,
            MetricOutcome::Error {
                status: MetricErrorStatus::InvalidArgument,
                ..
            }
        ));
        assert_eq!(engine.calls_to("report_metric"), 0);
    }

    #[tokio::test]
    async fn duplicate_is_skipped() {
        let engine = Arc::new(MemoryRunEngine::new());
        let run_id = engine.seed_run("r", "");
        let reporter = BatchReporter::new(engine.clone());
        let item = MetricItem::new("loss", "train", 0.25);

        let results = reporter.report(&run_id, &[item.clone(), item]).await;
        assert!(results[0].outcome.is_ok());
        assert!(matches!(results[1].outcome, MetricOutcome::Skipped { .. }));
        assert_eq!(engine.run(&run_id).unwrap().metrics.len(), 1);
    }

    #[tokio::test]
    async fn engine_failure_is_internal_error() {
        let engine = Arc::new(MemoryRunEngine::new());
        let results = BatchReporter::new(engine)
            .report("gone", &[MetricItem::new("loss", "train", 0.25)])
            .await;
        assert!(matches!(
            results[0].outcome,
            MetricOutcome::Error {
                status: MetricErrorStatus::InternalError,
                ..
            }
        ));
    }
}
