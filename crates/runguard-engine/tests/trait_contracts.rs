//! Trait contract tests for RunEngine.
//!
//! These tests verify the behavioral contract of the engine trait using the
//! in-memory fake. Any conforming implementation must pass these.

use runguard_engine::fakes::MemoryRunEngine;
use runguard_engine::*;
use serde_json::json;

fn owned_by(key: ResourceKey) -> NewRun {
    NewRun {
        name: "train".to_string(),
        resource_references: vec![ResourceReference::owner(key)],
        ..Default::default()
    }
}

fn page(size: usize) -> ListOptions {
    ListOptions::new(size, SortSpec::default(), Filter::default())
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn create_then_get_round_trip() {
    let engine = MemoryRunEngine::new();
    let created = engine
        .create_run(owned_by(ResourceKey::namespace("team-a")))
        .await
        .unwrap();
    let fetched = engine.get_run(&created.run.id).await.unwrap();

    assert_eq!(fetched.run.id, created.run.id);
    assert_eq!(fetched.run.name, "train");
    assert_eq!(fetched.run.status, RunStatus::Running);
}

#[tokio::test]
async fn get_missing_run_is_not_found() {
    let engine = MemoryRunEngine::new();
    let err = engine.get_run("nope").await.unwrap_err();

    assert!(matches!(err, EngineError::RunNotFound { .. }));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn archive_and_unarchive_toggle_storage_state() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");

    engine.archive_run(&run_id).await.unwrap();
    assert_eq!(
        engine.run(&run_id).unwrap().storage_state,
        StorageState::Archived
    );

    engine.unarchive_run(&run_id).await.unwrap();
    assert_eq!(
        engine.run(&run_id).unwrap().storage_state,
        StorageState::Available
    );
}

#[tokio::test]
async fn delete_removes_run() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");
    engine.delete_run(&run_id).await.unwrap();

    assert!(engine.get_run(&run_id).await.is_err());
    assert!(matches!(
        engine.delete_run(&run_id).await.unwrap_err(),
        EngineError::RunNotFound { .. }
    ));
}

#[tokio::test]
async fn terminate_only_active_runs() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");
    engine.terminate_run(&run_id).await.unwrap();
    assert_eq!(engine.run(&run_id).unwrap().status, RunStatus::Failed);

    let err = engine.terminate_run(&run_id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRunState { .. }));
}

#[tokio::test]
async fn retry_only_failed_runs() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");

    let err = engine.retry_run(&run_id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRunState { .. }));

    engine.set_status(&run_id, RunStatus::Error).unwrap();
    engine.retry_run(&run_id).await.unwrap();
    assert_eq!(engine.run(&run_id).unwrap().status, RunStatus::Running);
}

// ===========================================================================
// Ownership lookups
// ===========================================================================

#[tokio::test]
async fn created_run_inherits_experiment_namespace() {
    let engine = MemoryRunEngine::new().with_experiment("exp-1", "team-b");
    let created = engine
        .create_run(owned_by(ResourceKey::experiment("exp-1")))
        .await
        .unwrap();

    assert_eq!(
        engine.namespace_for_run(&created.run.id).await.unwrap(),
        "team-b"
    );
}

#[tokio::test]
async fn legacy_experiment_alias_resolves_like_experiment() {
    let engine = MemoryRunEngine::new().with_experiment("exp-1", "team-b");
    let created = engine
        .create_run(owned_by(ResourceKey::new(
            ResourceType::ExperimentUuid,
            "exp-1",
        )))
        .await
        .unwrap();

    assert_eq!(
        engine.namespace_for_run(&created.run.id).await.unwrap(),
        "team-b"
    );
}

#[tokio::test]
async fn unknown_experiment_is_not_found() {
    let engine = MemoryRunEngine::new();
    let err = engine.namespace_for_experiment("ghost").await.unwrap_err();
    assert!(matches!(err, EngineError::ExperimentNotFound { .. }));
}

// ===========================================================================
// Metrics and artifacts
// ===========================================================================

#[tokio::test]
async fn metric_recorded_once_per_node_and_name() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");
    let metric = MetricItem::new("accuracy", "node-1", 0.9);

    engine.report_metric(&run_id, &metric).await.unwrap();
    let err = engine.report_metric(&run_id, &metric).await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateMetric { .. }));

    // Same name on another node is a different metric
    engine
        .report_metric(&run_id, &MetricItem::new("accuracy", "node-2", 0.8))
        .await
        .unwrap();
    assert_eq!(engine.run(&run_id).unwrap().metrics.len(), 2);
}

#[tokio::test]
async fn artifact_read_back() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");
    engine
        .put_artifact(&run_id, "node-1", "model", b"\x00\x01weights")
        .unwrap();

    let data = engine.read_artifact(&run_id, "node-1", "model").await.unwrap();
    assert_eq!(data, b"\x00\x01weights");

    let err = engine
        .read_artifact(&run_id, "node-1", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ArtifactNotFound { .. }));
}

// ===========================================================================
// Listing
// ===========================================================================

#[tokio::test]
async fn list_scopes_by_namespace() {
    let engine = MemoryRunEngine::new();
    engine.seed_run("a1", "team-a");
    engine.seed_run("a2", "team-a");
    engine.seed_run("b1", "team-b");

    let ctx = FilterContext {
        reference_key: Some(ResourceKey::namespace("team-a")),
    };
    let result = engine.list_runs(&ctx, &page(10)).await.unwrap();
    assert_eq!(result.total_size, 2);
    assert!(result.runs.iter().all(|r| r.name.starts_with('a')));
}

#[tokio::test]
async fn list_paginates_with_tokens() {
    let engine = MemoryRunEngine::new();
    for name in ["r1", "r2", "r3", "r4", "r5"] {
        engine.seed_run(name, "team-a");
    }
    let opts = ListOptions::new(
        2,
        SortSpec {
            field: "name".to_string(),
            descending: false,
        },
        Filter::default(),
    );
    let ctx = FilterContext::default();

    let first = engine.list_runs(&ctx, &opts).await.unwrap();
    let names: Vec<_> = first.runs.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["r1", "r2"]);
    assert_eq!(first.total_size, 5);

    let next = ListOptions::from_page_token(&first.next_page_token, 2).unwrap();
    let second = engine.list_runs(&ctx, &next).await.unwrap();
    let names: Vec<_> = second.runs.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["r3", "r4"]);

    let last = ListOptions::from_page_token(&second.next_page_token, 2).unwrap();
    let third = engine.list_runs(&ctx, &last).await.unwrap();
    assert_eq!(third.runs.len(), 1);
    assert!(third.next_page_token.is_empty());
}

#[tokio::test]
async fn list_applies_predicates_and_descending_sort() {
    let engine = MemoryRunEngine::new();
    for name in ["train-a", "train-b", "eval-a"] {
        engine.seed_run(name, "team-a");
    }
    let opts = ListOptions::new(
        10,
        SortSpec {
            field: "name".to_string(),
            descending: true,
        },
        Filter {
            predicates: vec![Predicate {
                key: "name".to_string(),
                op: PredicateOp::IsSubstring,
                value: json!("train"),
            }],
        },
    );
    let result = engine
        .list_runs(&FilterContext::default(), &opts)
        .await
        .unwrap();
    let names: Vec<_> = result.runs.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["train-b", "train-a"]);
}

#[tokio::test]
async fn calls_are_counted_per_operation() {
    let engine = MemoryRunEngine::new();
    let run_id = engine.seed_run("r", "team-a");
    engine.get_run(&run_id).await.unwrap();
    engine.get_run(&run_id).await.unwrap();

    assert_eq!(engine.calls_to("get_run"), 2);
    assert_eq!(engine.calls_to("list_runs"), 0);
    assert_eq!(engine.total_calls(), 2);
}
