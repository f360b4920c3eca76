//! Table replication toggle tests.
//!
//! Every publication mutation must be followed by a stop-then-start restart,
//! and calls that would not change the table set must touch nothing.

use std::collections::BTreeSet;

use lakebridge_core::*;
use lakebridge_orchestrator::*;
use lakebridge_platform::{Operation, Sandbox};

const PROJECT: &str = "proj";

fn bucket() -> BucketId {
    BucketId::parse("lake").unwrap()
}

fn orders() -> SourceTable {
    SourceTable::new("public", "orders")
}

fn events() -> SourceTable {
    SourceTable::new("public", "events")
}

/// A connected bucket replicating `public.orders`, with the call log cleared.
async fn connected() -> (Sandbox, Orchestrator) {
    let sandbox = Sandbox::new();
    let source_id = sandbox
        .seed_source(PROJECT, [orders(), events(), SourceTable::new("sales", "refunds")])
        .await;
    sandbox.seed_analytics_bucket(&bucket(), "https://catalog.local").await;

    let mut config = LakebridgeConfig::default();
    config.project.project_ref = PROJECT.to_string();
    let orchestrator = Orchestrator::new(sandbox.platform(), config);
    orchestrator
        .provisioner()
        .connect(ConnectRequest {
            bucket_id: bucket().to_string(),
            source_id: Some(source_id),
            tables: vec![orders()],
        })
        .await
        .unwrap();
    sandbox.clear_calls().await;
    (sandbox, orchestrator)
}

async fn published(orchestrator: &Orchestrator) -> BTreeSet<SourceTable> {
    orchestrator
        .resolve(&bucket())
        .await
        .publication
        .map(|p| p.tables)
        .unwrap_or_default()
}

fn mutations(calls: &[Operation]) -> Vec<Operation> {
    calls
        .iter()
        .copied()
        .filter(|op| {
            matches!(
                op,
                Operation::UpdatePublication | Operation::StopPipeline | Operation::StartPipeline
            )
        })
        .collect()
}

#[tokio::test]
async fn enable_adds_table_and_restarts() {
    let (sandbox, orchestrator) = connected().await;

    let outcome = orchestrator
        .toggle()
        .enable(&bucket(), "public_events_changelog")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Applied {
            tables: BTreeSet::from([orders(), events()])
        }
    );
    assert_eq!(
        mutations(&sandbox.calls().await),
        vec![
            Operation::UpdatePublication,
            Operation::StopPipeline,
            Operation::StartPipeline,
        ]
    );
}

#[tokio::test]
async fn enable_of_present_table_is_a_noop() {
    let (sandbox, orchestrator) = connected().await;

    let outcome = orchestrator
        .toggle()
        .enable(&bucket(), "public_orders_changelog")
        .await
        .unwrap();
    assert_eq!(outcome, ToggleOutcome::Unchanged);
    assert!(mutations(&sandbox.calls().await).is_empty());
    assert_eq!(published(&orchestrator).await, BTreeSet::from([orders()]));
}

#[tokio::test]
async fn disable_removes_table_and_restarts() {
    let (sandbox, orchestrator) = connected().await;

    let outcome = orchestrator
        .toggle()
        .disable(&bucket(), "public_orders_changelog")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Applied {
            tables: BTreeSet::new()
        }
    );
    assert_eq!(
        mutations(&sandbox.calls().await),
        vec![
            Operation::UpdatePublication,
            Operation::StopPipeline,
            Operation::StartPipeline,
        ]
    );
}

#[tokio::test]
async fn disable_of_absent_table_is_a_noop() {
    let (sandbox, orchestrator) = connected().await;

    let outcome = orchestrator
        .toggle()
        .disable(&bucket(), "public_events_changelog")
        .await
        .unwrap();
    assert_eq!(outcome, ToggleOutcome::Unchanged);
    assert!(mutations(&sandbox.calls().await).is_empty());
}

#[tokio::test]
async fn enable_unknown_catalog_table_errors_without_mutation() {
    let (sandbox, orchestrator) = connected().await;

    let err = orchestrator
        .toggle()
        .enable(&bucket(), "public_missing_changelog")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTable(ref t) if t == "public_missing_changelog"));
    assert!(mutations(&sandbox.calls().await).is_empty());
}

#[tokio::test]
async fn restart_failure_after_update_is_reported() {
    let (sandbox, orchestrator) = connected().await;
    sandbox.fail_once(Operation::StartPipeline).await;

    let err = orchestrator
        .toggle()
        .enable(&bucket(), "public_events_changelog")
        .await
        .unwrap_err();
    assert_eq!(err.restart_phase(), Some(RestartPhase::Start));
    // Declared and running state have diverged; the update is not undone.
    assert_eq!(published(&orchestrator).await, BTreeSet::from([orders(), events()]));
}

#[tokio::test]
async fn stop_failure_never_starts() {
    let (sandbox, orchestrator) = connected().await;
    sandbox.fail_once(Operation::StopPipeline).await;

    let err = orchestrator
        .toggle()
        .disable(&bucket(), "public_orders_changelog")
        .await
        .unwrap_err();
    assert_eq!(err.restart_phase(), Some(RestartPhase::Stop));
    assert!(!sandbox.calls().await.contains(&Operation::StartPipeline));
}

#[tokio::test]
async fn add_tables_unions_and_restarts_once() {
    let (sandbox, orchestrator) = connected().await;
    let refunds = SourceTable::new("sales", "refunds");

    let outcome = orchestrator
        .toggle()
        .add_tables(&bucket(), &[orders(), events(), refunds.clone()])
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Applied {
            tables: BTreeSet::from([orders(), events(), refunds])
        }
    );
    let calls = sandbox.calls().await;
    assert_eq!(calls.iter().filter(|op| **op == Operation::StopPipeline).count(), 1);

    let again = orchestrator
        .toggle()
        .add_tables(&bucket(), &[events()])
        .await
        .unwrap();
    assert_eq!(again, ToggleOutcome::Unchanged);
}

#[tokio::test]
async fn toggle_on_unconnected_bucket_is_not_connected() {
    let sandbox = Sandbox::new();
    sandbox.seed_source(PROJECT, [orders()]).await;
    let mut config = LakebridgeConfig::default();
    config.project.project_ref = PROJECT.to_string();
    let orchestrator = Orchestrator::new(sandbox.platform(), config);

    let err = orchestrator
        .toggle()
        .enable(&bucket(), "public_orders_changelog")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::NotConnected {
            kind: ResourceKind::Publication,
            ..
        }
    ));
}

#[tokio::test]
async fn failed_lookup_surfaces_as_lookup_error() {
    let (sandbox, orchestrator) = connected().await;
    sandbox.fail_once(Operation::ListPipelines).await;

    let err = orchestrator
        .toggle()
        .enable(&bucket(), "public_events_changelog")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Lookup {
            kind: ResourceKind::Pipeline,
            ..
        }
    ));
    assert!(mutations(&sandbox.calls().await).is_empty());
}
