//! Connection lifecycle tests.
//!
//! Drives the orchestrator against the in-memory sandbox: enable
//! replication, connect a bucket, reconcile until the replicator catches up,
//! inspect and rescan the namespace, then tear everything down.

use std::collections::BTreeSet;
use std::time::Duration;

use lakebridge_core::*;
use lakebridge_orchestrator::*;
use lakebridge_platform::{Operation, Sandbox};

const PROJECT: &str = "proj";

fn config() -> LakebridgeConfig {
    let mut config = LakebridgeConfig::default();
    config.project.project_ref = PROJECT.to_string();
    config
}

fn bucket() -> BucketId {
    BucketId::parse("analytics-1").unwrap()
}

async fn seeded(sandbox: &Sandbox) -> SourceId {
    let source_id = sandbox
        .seed_source(
            PROJECT,
            [
                SourceTable::new("public", "orders"),
                SourceTable::new("public", "events"),
            ],
        )
        .await;
    sandbox.seed_analytics_bucket(&bucket(), "https://catalog.local").await;
    source_id
}

fn orders_request(source_id: SourceId) -> ConnectRequest {
    ConnectRequest {
        bucket_id: bucket().to_string(),
        source_id: Some(source_id),
        tables: vec![SourceTable::new("public", "orders")],
    }
}

#[tokio::test]
async fn namespace_failure_leaves_publication_in_place() {
    let sandbox = Sandbox::new();
    let source_id = seeded(&sandbox).await;
    sandbox.fail_once(Operation::CreateNamespace).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let err = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap_err();
    assert_eq!(err.failed_step(), Some(ProvisionStep::CreateNamespace));
    assert!(err.to_string().contains("analytics_1_namespace"));

    let entities = orchestrator.resolve(&bucket()).await;
    let publication = entities.publication.expect("publication survives");
    assert_eq!(publication.name, "analytics_analytics_1_publication");
    assert!(publication.contains(&SourceTable::new("public", "orders")));
    assert!(entities.destination.is_none());
    assert!(entities.pipeline.is_none());
}

#[tokio::test(start_paused = true)]
async fn connect_then_reconcile_converges_on_third_tick() {
    let sandbox = Sandbox::new().with_replicator_lag(2);
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let outcome = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();
    let handle = orchestrator.reconcile_tables(&outcome);

    let status = handle.wait().await;
    assert_eq!(status.phase, PollPhase::Converged);
    assert_eq!(status.ticks, 3);
    assert!(status.outstanding.is_empty());

    // Converged handles stay put.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.status().ticks, 3);
}

#[tokio::test(start_paused = true)]
async fn reconcile_bucket_waits_for_tables_added_after_connect() {
    let sandbox = Sandbox::new().with_replicator_lag(2);
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let outcome = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();
    assert_eq!(orchestrator.reconcile_tables(&outcome).wait().await.phase, PollPhase::Converged);

    // The restart resets the replicator lag.
    orchestrator
        .toggle()
        .add_tables(&bucket(), &[SourceTable::new("public", "events")])
        .await
        .unwrap();

    let handle = orchestrator.reconcile_bucket(&bucket()).await.unwrap();
    let mut rx = handle.subscribe();
    rx.changed().await.unwrap();
    let first = rx.borrow_and_update().clone();
    assert_eq!(first.phase, PollPhase::Polling);
    assert_eq!(first.outstanding, BTreeSet::from(["public_events_changelog".to_string()]));

    let status = handle.wait().await;
    assert_eq!(status.phase, PollPhase::Converged);
    assert_eq!(status.ticks, 3);
    let tables = sandbox
        .catalog_tables("analytics-1", &outcome.namespace)
        .await
        .unwrap();
    assert!(tables.contains("public_events_changelog"));
}

#[tokio::test]
async fn reconcile_bucket_requires_a_connection() {
    let sandbox = Sandbox::new();
    seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let err = orchestrator.reconcile_bucket(&bucket()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotConnected { .. }));
}

#[tokio::test]
async fn access_key_is_recreated_after_teardown() {
    let sandbox = Sandbox::new();
    seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let seeded_key = orchestrator.ensure_access_key(&bucket()).await.unwrap();
    assert_eq!(seeded_key.description, "analytics_1_keys");
    assert!(!sandbox.calls().await.contains(&Operation::CreateAccessKey));

    orchestrator.teardown(&bucket()).await;
    assert!(sandbox.access_keys().await.is_empty());

    let key = orchestrator.ensure_access_key(&bucket()).await.unwrap();
    assert_eq!(key.description, "analytics_1_keys");
    assert_ne!(key.id, seeded_key.id);
    assert_eq!(orchestrator.resolve(&bucket()).await.s3_access_key, Some(key));
}

#[tokio::test(start_paused = true)]
async fn namespace_reconciliation_sees_created_namespace() {
    let sandbox = Sandbox::new();
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let outcome = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();
    let handle = orchestrator.reconcile_namespaces(
        outcome.connection.clone(),
        BTreeSet::from([outcome.namespace.clone()]),
    );
    assert_eq!(handle.wait().await.phase, PollPhase::Converged);
}

#[tokio::test(start_paused = true)]
async fn pipeline_watch_after_connect() {
    let sandbox = Sandbox::new().with_startup_polls(2);
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let outcome = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();
    let polls = orchestrator
        .pipeline_watch()
        .wait_until_started(outcome.pipeline_id)
        .await
        .unwrap();
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn enable_replication_then_connect() {
    let sandbox = Sandbox::new();
    sandbox.seed_analytics_bucket(&bucket(), "https://catalog.local").await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());

    let source_id = orchestrator.enable_replication().await.unwrap();
    assert_eq!(orchestrator.enable_replication().await.unwrap(), source_id);
    assert_eq!(orchestrator.resolve(&bucket()).await.source_id, Some(source_id));
}

#[tokio::test]
async fn namespace_overview_rescan_and_delete() {
    let sandbox = Sandbox::new();
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());
    let outcome = orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();
    let namespace = outcome.namespace.as_str();
    let maintenance = orchestrator.namespaces();

    // Replicator lag is zero: the first listing materializes the table.
    let overview = maintenance.overview(&bucket(), namespace).await.unwrap();
    assert!(overview.connected.is_empty());
    assert_eq!(overview.unconnected, vec!["public_orders_changelog".to_string()]);
    assert!(overview.awaiting.is_empty());
    assert_eq!(overview.foreign_schema, "fdw_analytics_analytics_1_namespace");

    maintenance.rescan(&bucket(), namespace).await.unwrap();
    sandbox.insert_catalog_table("analytics-1", namespace, "manual_table").await;

    let overview = maintenance.overview(&bucket(), namespace).await.unwrap();
    assert_eq!(overview.connected.len(), 1);
    let connected = &overview.connected[0];
    assert_eq!(connected.catalog_table, "public_orders_changelog");
    assert_eq!(connected.source_table, Some(SourceTable::new("public", "orders")));
    assert_eq!(connected.state, TableReplicationState::Running);
    assert_eq!(connected.foreign_table.schema, "fdw_analytics_analytics_1_namespace");
    assert_eq!(overview.unconnected, vec!["manual_table".to_string()]);

    maintenance.delete_namespace(&bucket(), namespace).await.unwrap();
    assert!(sandbox.catalog_tables("analytics-1", namespace).await.is_none());
    let wrapper = orchestrator.resolve(&bucket()).await.wrapper.unwrap();
    assert!(wrapper.tables.is_empty());
    assert!(sandbox.calls().await.contains(&Operation::UpdateWrapper));
}

#[tokio::test]
async fn teardown_after_connect_deletes_everything() {
    let sandbox = Sandbox::new();
    let source_id = seeded(&sandbox).await;
    let orchestrator = Orchestrator::new(sandbox.platform(), config());
    orchestrator
        .provisioner()
        .connect(orders_request(source_id))
        .await
        .unwrap();

    let report = orchestrator.teardown(&bucket()).await;
    assert!(report.is_complete());
    assert!(report.outcomes.values().all(|o| *o == TeardownOutcome::Deleted));

    let entities = orchestrator.resolve(&bucket()).await;
    assert!(entities.wrapper.is_none());
    assert!(entities.s3_access_key.is_none());
    assert!(entities.publication.is_none());
    assert!(entities.destination.is_none());
    assert!(entities.pipeline.is_none());
}

#[tokio::test]
async fn teardown_attempts_every_deletion_despite_failures() {
    let failing = [
        Operation::DeleteWrapper,
        Operation::DeleteAccessKey,
        Operation::DeleteDestinationPipeline,
    ];
    // One, two, then three failing deletions.
    for count in 1..=failing.len() {
        let sandbox = Sandbox::new();
        let source_id = seeded(&sandbox).await;
        let orchestrator = Orchestrator::new(sandbox.platform(), config());
        orchestrator
            .provisioner()
            .connect(orders_request(source_id))
            .await
            .unwrap();
        for op in &failing[..count] {
            sandbox.fail_always(*op).await;
        }
        sandbox.clear_calls().await;

        let report = orchestrator.teardown(&bucket()).await;

        let calls = sandbox.calls().await;
        for op in [
            Operation::DeleteWrapper,
            Operation::DeleteAccessKey,
            Operation::DeleteDestinationPipeline,
            Operation::DeletePublication,
        ] {
            assert!(calls.contains(&op), "{op:?} not attempted with {count} failures");
        }
        assert_eq!(report.pending().len(), count);
        assert_eq!(
            report.outcome(TeardownResource::Publication),
            Some(&TeardownOutcome::Deleted)
        );
    }
}
