//! Multi-tenant authorization behaviour of `RunServer`.
//!
//! Covers resolution totality, the legacy experiment alias, ListRuns
//! closure, the single-tenant bypass and the empty-namespace fault.

use std::sync::Arc;

use runguard_core::{
    AccessResolver, CallerContext, CreateRunRequest, ErrorKind, ListRunsRequest, NamespacePolicy,
    Principal, ReportRunMetricsRequest, RunIdRequest, RunServer, ServerConfig,
};
use runguard_engine::fakes::MemoryRunEngine;
use runguard_engine::{
    MetricItem, NewRun, PipelineSpec, ResourceKey, ResourceReference, ResourceType,
};

fn engine() -> Arc<MemoryRunEngine> {
    Arc::new(
        MemoryRunEngine::new()
            .with_experiment("exp-a", "team-a")
            .with_experiment("exp-b", "team-b"),
    )
}

fn policy() -> Arc<NamespacePolicy> {
    Arc::new(
        NamespacePolicy::new()
            .with_principal(Principal::member_of("alice", &["team-a"]))
            .with_principal(Principal::admin("root")),
    )
}

fn multi_tenant(engine: &Arc<MemoryRunEngine>) -> RunServer {
    RunServer::new(engine.clone(), policy(), ServerConfig::multi_tenant())
}

fn single_tenant(engine: &Arc<MemoryRunEngine>) -> RunServer {
    RunServer::new(engine.clone(), policy(), ServerConfig::single_tenant())
}

fn runnable(name: &str, references: Vec<ResourceReference>) -> CreateRunRequest {
    CreateRunRequest {
        run: NewRun {
            name: name.to_string(),
            pipeline_spec: Some(PipelineSpec {
                workflow_manifest: Some("{}".into()),
                ..Default::default()
            }),
            resource_references: references,
            ..Default::default()
        },
    }
}

fn list_by(key: Option<ResourceKey>) -> ListRunsRequest {
    ListRunsRequest {
        resource_reference_key: key,
        ..Default::default()
    }
}

#[tokio::test]
async fn resolution_is_total_for_supported_types() {
    let engine = engine();
    let resolver = AccessResolver::new(engine.clone());

    let keys = [
        ResourceKey::namespace("team-z"),
        ResourceKey::experiment("exp-a"),
        ResourceKey::new(ResourceType::ExperimentUuid, "exp-a"),
        ResourceKey::experiment("no-such-experiment"),
        ResourceKey::new(ResourceType::ExperimentUuid, "no-such-experiment"),
    ];
    for key in keys {
        match resolver.resolve_namespace(&key).await {
            Ok(namespace) => assert!(!namespace.is_empty(), "{}", key),
            Err(err) => assert_ne!(err.kind(), ErrorKind::AuthorizationDenied, "{}", key),
        }
    }
}

#[tokio::test]
async fn unresolvable_experiment_never_allows() {
    let engine = engine();
    let server = multi_tenant(&engine);

    let err = server
        .create_run(
            &CallerContext::new("root"),
            runnable(
                "ghost",
                vec![ResourceReference::owner(ResourceKey::experiment("missing"))],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.calls_to("create_run"), 0);
}

#[tokio::test]
async fn legacy_alias_matches_experiment() {
    let engine = engine();
    let id_a = engine.seed_run("a", "team-a");
    engine.seed_run("b", "team-b");
    let server = multi_tenant(&engine);

    for (caller, experiment) in [
        ("alice", "exp-a"),
        ("alice", "exp-b"),
        ("mallory", "exp-a"),
        ("root", "exp-b"),
        ("alice", "exp-missing"),
    ] {
        let caller = CallerContext::new(caller);
        let plain = server
            .list_runs(&caller, list_by(Some(ResourceKey::experiment(experiment))))
            .await;
        let legacy = server
            .list_runs(
                &caller,
                list_by(Some(ResourceKey::new(ResourceType::ExperimentUuid, experiment))),
            )
            .await;
        match (plain, legacy) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.kind(), b.kind()),
            (a, b) => panic!("alias diverged for {}: {:?} vs {:?}", experiment, a, b),
        }
    }

    // Creation through the alias is checked the same way.
    let denied = server
        .create_run(
            &CallerContext::new("alice"),
            runnable(
                "via-alias",
                vec![ResourceReference::owner(ResourceKey::new(
                    ResourceType::ExperimentUuid,
                    "exp-b",
                ))],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::AuthorizationDenied);

    server
        .get_run(&CallerContext::new("alice"), RunIdRequest::new(&id_a))
        .await
        .unwrap();
}

#[tokio::test]
async fn multi_tenant_list_requires_scoping_reference() {
    let engine = engine();
    engine.seed_run("a", "team-a");
    let server = multi_tenant(&engine);
    let caller = CallerContext::new("root");

    let cases = [
        None,
        Some(ResourceKey::new(ResourceType::Unknown, "x")),
        Some(ResourceKey::new(ResourceType::Job, "job-1")),
        Some(ResourceKey::new(ResourceType::PipelineVersion, "v1")),
        Some(ResourceKey::namespace("")),
        Some(ResourceKey::experiment("")),
        Some(ResourceKey::new(ResourceType::ExperimentUuid, "")),
    ];
    for key in cases {
        let err = server
            .list_runs(&caller, list_by(key.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{:?}", key);
    }
    assert_eq!(engine.calls_to("list_runs"), 0);
}

#[tokio::test]
async fn multi_tenant_list_scoped_to_namespace() {
    let engine = engine();
    engine.seed_run("a", "team-a");
    engine.seed_run("b", "team-b");
    let server = multi_tenant(&engine);

    let page = server
        .list_runs(
            &CallerContext::new("alice"),
            list_by(Some(ResourceKey::namespace("team-a"))),
        )
        .await
        .unwrap();
    assert_eq!(page.total_size, 1);
    assert_eq!(page.runs[0].name, "a");

    let err = server
        .list_runs(
            &CallerContext::new("alice"),
            list_by(Some(ResourceKey::namespace("team-b"))),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
    assert_eq!(
        err.to_string(),
        "Failed to authorize the request: Failed to authorize with namespace resource reference: not authorized"
    );
}

#[tokio::test]
async fn single_tenant_bypasses_authorization() {
    let engine = engine();
    let other = engine.seed_run("other", "team-b");
    let legacy = engine.seed_run("legacy", "");
    let server = single_tenant(&engine);
    let anonymous = CallerContext::anonymous();

    for id in [&other, &legacy] {
        server
            .get_run(&anonymous, RunIdRequest::new(id))
            .await
            .unwrap();
        server
            .archive_run(&anonymous, RunIdRequest::new(id))
            .await
            .unwrap();
        server
            .unarchive_run(&anonymous, RunIdRequest::new(id))
            .await
            .unwrap();
        server
            .terminate_run(&anonymous, RunIdRequest::new(id))
            .await
            .unwrap();
        server
            .retry_run(&anonymous, RunIdRequest::new(id))
            .await
            .unwrap();
        server
            .report_run_metrics(
                &anonymous,
                ReportRunMetricsRequest {
                    run_id: id.to_string(),
                    metrics: vec![MetricItem::new("loss", "n", 0.1)],
                },
            )
            .await
            .unwrap();
    }

    for key in [
        None,
        Some(ResourceKey::namespace("anything")),
        Some(ResourceKey::new(ResourceType::Job, "job-1")),
    ] {
        server.list_runs(&anonymous, list_by(key)).await.unwrap();
    }

    server
        .create_run(&anonymous, runnable("unscoped", vec![]))
        .await
        .unwrap();

    server
        .delete_run(&anonymous, RunIdRequest::new(&other))
        .await
        .unwrap();

    assert_eq!(engine.calls_to("namespace_for_run"), 0);
    assert_eq!(engine.calls_to("namespace_for_experiment"), 0);
}

#[tokio::test]
async fn unknown_reference_rejected_even_single_tenant() {
    let engine = engine();
    let server = single_tenant(&engine);
    let err = server
        .list_runs(
            &CallerContext::anonymous(),
            list_by(Some(ResourceKey::new(ResourceType::Unknown, "x"))),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(err
        .to_string()
        .starts_with("Validating filter failed: Unrecognized resource reference type"));
    assert_eq!(engine.calls_to("list_runs"), 0);
}

#[tokio::test]
async fn empty_run_namespace_is_internal_error() {
    let engine = engine();
    let legacy = engine.seed_run("legacy", "");
    let server = multi_tenant(&engine);
    let root = CallerContext::new("root");

    let get = server.get_run(&root, RunIdRequest::new(&legacy)).await;
    let archive = server.archive_run(&root, RunIdRequest::new(&legacy)).await;
    let unarchive = server.unarchive_run(&root, RunIdRequest::new(&legacy)).await;
    let delete = server.delete_run(&root, RunIdRequest::new(&legacy)).await;
    let terminate = server.terminate_run(&root, RunIdRequest::new(&legacy)).await;
    let retry = server.retry_run(&root, RunIdRequest::new(&legacy)).await;

    assert_eq!(get.unwrap_err().kind(), ErrorKind::Internal);
    for result in [archive, unarchive, delete, terminate, retry] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Internal);
    }
    assert!(engine.run(&legacy).is_some());
}

#[tokio::test]
async fn missing_run_is_not_found_in_multi_tenant() {
    let engine = engine();
    let server = multi_tenant(&engine);
    let err = server
        .get_run(&CallerContext::new("root"), RunIdRequest::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn cross_tenant_mutations_denied() {
    let engine = engine();
    let theirs = engine.seed_run("theirs", "team-b");
    let server = multi_tenant(&engine);
    let alice = CallerContext::new("alice");

    let results = [
        server.get_run(&alice, RunIdRequest::new(&theirs)).await.map(|_| ()),
        server.archive_run(&alice, RunIdRequest::new(&theirs)).await.map(|_| ()),
        server.delete_run(&alice, RunIdRequest::new(&theirs)).await.map(|_| ()),
        server.terminate_run(&alice, RunIdRequest::new(&theirs)).await.map(|_| ()),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
        assert!(!err.to_string().contains("boundary"));
    }
    assert_eq!(engine.calls_to("get_run"), 0);
    assert_eq!(engine.calls_to("archive_run"), 0);
}
