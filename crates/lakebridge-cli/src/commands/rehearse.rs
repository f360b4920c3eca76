//! `lakebridge rehearse`: run connect → reconcile → toggle → teardown
//! against the sandbox and print what happened at each stage.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use tracing::info;

use lakebridge_core::naming::changelog_table_name;
use lakebridge_core::{BucketId, LakebridgeConfig, SourceTable};
use lakebridge_orchestrator::provisioner::{BoxFuture, ProgressCallback};
use lakebridge_orchestrator::{
    ConnectRequest, Orchestrator, ProvisionStep, StepEvent, TeardownOutcome,
};
use lakebridge_platform::{Operation, Sandbox};

/// Provisioning step to fail, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailStep {
    CreatePublication,
    ResolveCredentials,
    CreateNamespace,
    CreateDestinationPipeline,
    StartPipeline,
}

impl FailStep {
    /// The sandbox call that makes this step fail.
    fn operation(self) -> Operation {
        match ProvisionStep::from(self) {
            ProvisionStep::CreatePublication => Operation::CreatePublication,
            ProvisionStep::ResolveCredentials => Operation::Decrypt,
            ProvisionStep::CreateNamespace => Operation::CreateNamespace,
            ProvisionStep::CreateDestinationPipeline => Operation::CreateDestinationPipeline,
            ProvisionStep::StartPipeline => Operation::StartPipeline,
        }
    }
}

impl From<FailStep> for ProvisionStep {
    fn from(step: FailStep) -> Self {
        match step {
            FailStep::CreatePublication => ProvisionStep::CreatePublication,
            FailStep::ResolveCredentials => ProvisionStep::ResolveCredentials,
            FailStep::CreateNamespace => ProvisionStep::CreateNamespace,
            FailStep::CreateDestinationPipeline => ProvisionStep::CreateDestinationPipeline,
            FailStep::StartPipeline => ProvisionStep::StartPipeline,
        }
    }
}

pub struct RehearseArgs {
    pub bucket: String,
    pub tables: Vec<String>,
    pub config: Option<PathBuf>,
    pub fail_step: Option<FailStep>,
    pub replicator_lag: u32,
}

pub async fn rehearse(args: RehearseArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => LakebridgeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => LakebridgeConfig::default(),
    };
    let bucket = BucketId::parse(&args.bucket)?;
    let tables = args
        .tables
        .iter()
        .map(|raw| raw.parse::<SourceTable>())
        .collect::<Result<Vec<_>, _>>()?;
    let project_ref = config.project.project_ref.clone();

    let sandbox = Sandbox::new()
        .with_replicator_lag(args.replicator_lag)
        .with_startup_polls(1);
    sandbox.seed_source(&project_ref, tables.iter().cloned()).await;
    sandbox
        .seed_analytics_bucket(&bucket, "https://catalog.sandbox.local")
        .await;
    if let Some(step) = args.fail_step {
        sandbox.fail_once(step.operation()).await;
    }

    let orchestrator = Orchestrator::new(sandbox.platform(), config);
    let source_id = orchestrator.enable_replication().await?;
    info!(%project_ref, source_id, "sandbox ready");
    let key = orchestrator.ensure_access_key(&bucket).await?;
    println!("✓ s3 access key {} ({})", key.description, key.id);

    // ── Connect ────────────────────────────────────────────────────
    let progress: ProgressCallback = Arc::new(|step: ProvisionStep, event: StepEvent| {
        if event != StepEvent::Started {
            let mark = if event == StepEvent::Completed { "✓" } else { "✗" };
            println!("{mark} {step}");
        }
        Box::pin(async {}) as BoxFuture
    });
    let connected = orchestrator
        .provisioner()
        .with_callback(progress)
        .connect(ConnectRequest {
            bucket_id: bucket.to_string(),
            source_id: Some(source_id),
            tables: tables.clone(),
        })
        .await;

    let outcome = match connected {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("connect failed: {e}");
            let entities = orchestrator.resolve(&bucket).await;
            println!(
                "left in place: publication={} destination={} pipeline={}",
                entities.publication.is_some(),
                entities.destination.is_some(),
                entities.pipeline.is_some()
            );
            print_teardown(&orchestrator, &bucket).await?;
            return Err(e.into());
        }
    };

    // ── Reconcile ──────────────────────────────────────────────────
    orchestrator
        .pipeline_watch()
        .wait_until_started(outcome.pipeline_id)
        .await?;
    println!("✓ pipeline {} started", outcome.pipeline_id);

    let status = orchestrator.reconcile_tables(&outcome).wait().await;
    println!(
        "✓ reconciliation {} after {} ticks",
        serde_json::to_value(status.phase)?.as_str().unwrap_or("unknown"),
        status.ticks
    );

    orchestrator.namespaces().rescan(&bucket, &outcome.namespace).await?;
    let overview = orchestrator
        .namespaces()
        .overview(&bucket, &outcome.namespace)
        .await?;
    println!("{}", serde_json::to_string_pretty(&overview)?);

    // ── Toggle ─────────────────────────────────────────────────────
    if let Some(first) = tables.first() {
        let catalog_table = changelog_table_name(first);
        let toggle = orchestrator.toggle();
        let disabled = toggle.disable(&bucket, &catalog_table).await?;
        println!("✓ disable {catalog_table}: {disabled:?}");
        let enabled = toggle.enable(&bucket, &catalog_table).await?;
        println!("✓ enable {catalog_table}: {enabled:?}");

        let status = orchestrator.reconcile_bucket(&bucket).await?.wait().await;
        println!(
            "✓ re-reconciliation {} after {} ticks",
            serde_json::to_value(status.phase)?.as_str().unwrap_or("unknown"),
            status.ticks
        );
    }

    // ── Teardown ───────────────────────────────────────────────────
    print_teardown(&orchestrator, &bucket).await
}

async fn print_teardown(orchestrator: &Orchestrator, bucket: &BucketId) -> anyhow::Result<()> {
    let report = orchestrator.teardown(bucket).await;
    for (resource, outcome) in &report.outcomes {
        let mark = match outcome {
            TeardownOutcome::Deleted => "✓",
            TeardownOutcome::Skipped => "-",
            TeardownOutcome::Failed(_) => "✗",
        };
        println!("{mark} teardown {resource}");
    }
    if !report.is_complete() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
