//! Connection provisioner: the ordered saga that wires a bucket to the
//! catalog.
//!
//! ```text
//! CreatePublication ─▶ ResolveCredentials ─▶ CreateNamespace
//!                                                  │
//!                 StartPipeline ◀─ CreateDestinationPipeline
//! ```
//!
//! Steps run strictly in order; each consumes the previous step's output.
//! The first failure aborts the saga with the step, its resource name, and
//! the steps already completed. Completed resources are left in place
//! unless [`RollbackPolicy::ReverseOrder`] is configured.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use lakebridge_core::config::RollbackPolicy;
use lakebridge_core::naming::changelog_table_name;
use lakebridge_core::*;
use lakebridge_platform::{Platform, PlatformError, PlatformResult};

use crate::credentials::{CatalogCredentials, resolve_catalog_credentials};
use crate::error::{OrchestratorError, OrchestratorResult};

pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Callback invoked as each step starts, completes, or fails.
pub type ProgressCallback = Arc<dyn Fn(ProvisionStep, StepEvent) -> BoxFuture + Send + Sync>;

/// One step of the provisioning saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    CreatePublication,
    ResolveCredentials,
    CreateNamespace,
    CreateDestinationPipeline,
    StartPipeline,
}

impl ProvisionStep {
    pub const ALL: [ProvisionStep; 5] = [
        ProvisionStep::CreatePublication,
        ProvisionStep::ResolveCredentials,
        ProvisionStep::CreateNamespace,
        ProvisionStep::CreateDestinationPipeline,
        ProvisionStep::StartPipeline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProvisionStep::CreatePublication => "create_publication",
            ProvisionStep::ResolveCredentials => "resolve_credentials",
            ProvisionStep::CreateNamespace => "create_namespace",
            ProvisionStep::CreateDestinationPipeline => "create_destination_pipeline",
            ProvisionStep::StartPipeline => "start_pipeline",
        }
    }

    /// Name of the resource this step acts on.
    pub fn resource(self, names: &ResourceNames) -> &str {
        match self {
            ProvisionStep::CreatePublication => &names.publication,
            ProvisionStep::ResolveCredentials => &names.wrapper,
            ProvisionStep::CreateNamespace => &names.namespace,
            ProvisionStep::CreateDestinationPipeline | ProvisionStep::StartPipeline => {
                &names.destination
            }
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notification for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    Started,
    Completed,
    Failed,
}

/// A step together with the resource it acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub step: ProvisionStep,
    pub resource: String,
}

/// Build the ordered plan for a bucket.
pub fn plan(names: &ResourceNames) -> Vec<PlannedStep> {
    ProvisionStep::ALL
        .iter()
        .map(|&step| PlannedStep {
            step,
            resource: step.resource(names).to_string(),
        })
        .collect()
}

/// Caller input to [`Provisioner::connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectRequest {
    pub bucket_id: String,
    pub source_id: Option<SourceId>,
    pub tables: Vec<SourceTable>,
}

/// Everything a caller needs to seed reconciliation after a successful
/// connect.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub names: ResourceNames,
    /// Tables that were just requested.
    pub tables: BTreeSet<SourceTable>,
    pub connection: CatalogConnection,
    pub namespace: String,
    pub destination_id: DestinationId,
    pub pipeline_id: PipelineId,
}

impl ProvisionOutcome {
    /// Catalog table names the replicator is expected to create.
    pub fn expected_catalog_tables(&self) -> BTreeSet<String> {
        self.tables.iter().map(changelog_table_name).collect()
    }
}

/// Outputs carried between steps.
#[derive(Default)]
struct SagaState {
    credentials: Option<CatalogCredentials>,
    created: Option<CreatedPipeline>,
}

impl SagaState {
    fn credentials(&self) -> PlatformResult<&CatalogCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| PlatformError::Rejected("catalog credentials not resolved".into()))
    }

    fn created(&self) -> PlatformResult<CreatedPipeline> {
        self.created
            .ok_or_else(|| PlatformError::Rejected("destination pipeline not created".into()))
    }
}

/// Runs the provisioning saga against a [`Platform`].
pub struct Provisioner {
    platform: Platform,
    project_ref: String,
    default_region: String,
    rollback: RollbackPolicy,
    on_progress: Option<ProgressCallback>,
}

impl Provisioner {
    /// Provision into the project named by `config`, with no progress callback.
    pub fn new(platform: Platform, config: &LakebridgeConfig) -> Self {
        Self {
            platform,
            project_ref: config.project.project_ref.clone(),
            default_region: config.catalog.default_region.clone(),
            rollback: config.provisioning.rollback,
            on_progress: None,
        }
    }

    pub fn with_rollback(mut self, policy: RollbackPolicy) -> Self {
        self.rollback = policy;
        self
    }

    /// Set a callback for step progress.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Connect `request.tables` of the bucket to its catalog.
    pub async fn connect(&self, request: ConnectRequest) -> OrchestratorResult<ProvisionOutcome> {
        if self.project_ref.trim().is_empty() {
            return Err(OrchestratorError::Precondition("project ref is empty"));
        }
        if request.bucket_id.trim().is_empty() {
            return Err(OrchestratorError::Precondition("bucket id is empty"));
        }
        let source_id = request
            .source_id
            .ok_or(OrchestratorError::Precondition("replication source id is missing"))?;
        if request.tables.is_empty() {
            return Err(OrchestratorError::Precondition("no tables selected"));
        }
        let bucket = BucketId::parse(&request.bucket_id)?;

        let names = ResourceNames::derive(&bucket);
        let tables: BTreeSet<SourceTable> = request.tables.into_iter().collect();
        let mut saga = SagaState::default();
        let mut completed = Vec::new();

        info!(bucket = %bucket, tables = tables.len(), "provisioning connection");

        for planned in plan(&names) {
            self.report(planned.step, StepEvent::Started).await;
            let result = self
                .apply(planned.step, &bucket, &names, source_id, &tables, &mut saga)
                .await;

            match result {
                Ok(()) => {
                    info!(bucket = %bucket, step = %planned.step, resource = %planned.resource, "step completed");
                    completed.push(planned.step);
                    self.report(planned.step, StepEvent::Completed).await;
                }
                Err(source) => {
                    error!(
                        bucket = %bucket,
                        step = %planned.step,
                        resource = %planned.resource,
                        error = %source,
                        "step failed"
                    );
                    self.report(planned.step, StepEvent::Failed).await;
                    if self.rollback == RollbackPolicy::ReverseOrder {
                        self.compensate(&completed, &names, source_id, &saga).await;
                    }
                    return Err(OrchestratorError::Provision {
                        step: planned.step,
                        resource: planned.resource,
                        completed,
                        source,
                    });
                }
            }
        }

        let credentials = saga.credentials.take();
        let (Some(credentials), Some(created)) = (credentials, saga.created) else {
            return Err(OrchestratorError::Precondition("saga finished without outputs"));
        };

        info!(bucket = %bucket, pipeline_id = created.pipeline_id, "connection provisioned");
        Ok(ProvisionOutcome {
            namespace: names.namespace.clone(),
            names,
            tables,
            connection: credentials.connection,
            destination_id: created.destination_id,
            pipeline_id: created.pipeline_id,
        })
    }

    async fn apply(
        &self,
        step: ProvisionStep,
        bucket: &BucketId,
        names: &ResourceNames,
        source_id: SourceId,
        tables: &BTreeSet<SourceTable>,
        saga: &mut SagaState,
    ) -> PlatformResult<()> {
        let project_ref = self.project_ref.as_str();
        let replication = &self.platform.replication;

        match step {
            ProvisionStep::CreatePublication => {
                replication
                    .create_publication(project_ref, source_id, &names.publication, tables)
                    .await
            }
            ProvisionStep::ResolveCredentials => {
                let credentials = resolve_catalog_credentials(
                    &self.platform,
                    project_ref,
                    bucket,
                    &self.default_region,
                )
                .await?;
                saga.credentials = Some(credentials);
                Ok(())
            }
            ProvisionStep::CreateNamespace => {
                let credentials = saga.credentials()?;
                self.platform
                    .catalog
                    .create_namespace(&credentials.connection, &names.namespace)
                    .await
            }
            ProvisionStep::CreateDestinationPipeline => {
                let credentials = saga.credentials()?;
                let request = DestinationPipelineRequest {
                    destination_name: names.destination.clone(),
                    destination_config: DestinationConfig::Iceberg(IcebergDestinationConfig {
                        project_ref: project_ref.to_string(),
                        warehouse_name: credentials.connection.warehouse.clone(),
                        namespace: names.namespace.clone(),
                        catalog_uri: credentials.connection.uri.clone(),
                        catalog_token: credentials.connection.token.clone(),
                        s3_access_key_id: credentials.s3_access_key_id.clone(),
                        s3_secret_access_key: credentials.s3_secret_access_key.clone(),
                        s3_region: credentials.s3_region.clone(),
                    }),
                    source_id,
                    publication_name: names.publication.clone(),
                };
                let created = replication
                    .create_destination_pipeline(project_ref, &request)
                    .await?;
                saga.created = Some(created);
                Ok(())
            }
            ProvisionStep::StartPipeline => {
                let created = saga.created()?;
                replication
                    .start_pipeline(project_ref, created.pipeline_id)
                    .await
            }
        }
    }

    /// Undo completed steps in reverse order, best-effort.
    async fn compensate(
        &self,
        completed: &[ProvisionStep],
        names: &ResourceNames,
        source_id: SourceId,
        saga: &SagaState,
    ) {
        let project_ref = self.project_ref.as_str();
        let replication = &self.platform.replication;

        for &step in completed.iter().rev() {
            let result = match step {
                ProvisionStep::CreatePublication => {
                    replication
                        .delete_publication(project_ref, source_id, &names.publication)
                        .await
                }
                ProvisionStep::ResolveCredentials => continue,
                ProvisionStep::CreateNamespace => match saga.credentials() {
                    Ok(credentials) => {
                        self.platform
                            .catalog
                            .drop_namespace(&credentials.connection, &names.namespace)
                            .await
                    }
                    Err(e) => Err(e),
                },
                ProvisionStep::CreateDestinationPipeline => match saga.created() {
                    Ok(created) => {
                        replication
                            .delete_destination_pipeline(
                                project_ref,
                                created.destination_id,
                                created.pipeline_id,
                            )
                            .await
                    }
                    Err(e) => Err(e),
                },
                ProvisionStep::StartPipeline => match saga.created() {
                    Ok(created) => replication.stop_pipeline(project_ref, created.pipeline_id).await,
                    Err(e) => Err(e),
                },
            };

            match result {
                Ok(()) => info!(step = %step, resource = %step.resource(names), "rolled back"),
                Err(e) => warn!(
                    step = %step,
                    resource = %step.resource(names),
                    error = %e,
                    "rollback failed, resource left in place"
                ),
            }
        }
    }

    async fn report(&self, step: ProvisionStep, event: StepEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(step, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use lakebridge_platform::{Operation, Sandbox};

    use super::*;

    async fn seeded() -> (Sandbox, SourceId) {
        let sandbox = Sandbox::new();
        let source_id = sandbox
            .seed_source("proj", [SourceTable::new("public", "orders")])
            .await;
        sandbox
            .seed_analytics_bucket(&BucketId::parse("lake").unwrap(), "https://catalog")
            .await;
        (sandbox, source_id)
    }

    fn config() -> LakebridgeConfig {
        let mut config = LakebridgeConfig::default();
        config.project.project_ref = "proj".into();
        config
    }

    fn request(source_id: SourceId) -> ConnectRequest {
        ConnectRequest {
            bucket_id: "lake".into(),
            source_id: Some(source_id),
            tables: vec![SourceTable::new("public", "orders")],
        }
    }

    #[test]
    fn plan_is_ordered_with_resource_names() {
        let names = ResourceNames::derive(&BucketId::parse("lake").unwrap());
        let steps = plan(&names);
        assert_eq!(
            steps.iter().map(|p| p.step).collect::<Vec<_>>(),
            ProvisionStep::ALL.to_vec()
        );
        assert_eq!(steps[0].resource, "analytics_lake_publication");
        assert_eq!(steps[2].resource, "lake_namespace");
        assert_eq!(steps[3].resource, "analytics_lake_destination");
    }

    #[tokio::test]
    async fn preconditions_fail_without_side_effects() {
        let (sandbox, source_id) = seeded().await;
        let provisioner = Provisioner::new(sandbox.platform(), &config());
        sandbox.clear_calls().await;

        let cases = [
            ConnectRequest {
                bucket_id: String::new(),
                ..request(source_id)
            },
            ConnectRequest {
                source_id: None,
                ..request(source_id)
            },
            ConnectRequest {
                tables: Vec::new(),
                ..request(source_id)
            },
            ConnectRequest {
                bucket_id: "Not_Valid".into(),
                ..request(source_id)
            },
        ];
        for case in cases {
            assert!(provisioner.connect(case).await.is_err());
        }
        assert!(sandbox.calls().await.is_empty());
    }

    #[tokio::test]
    async fn empty_project_ref_is_a_precondition() {
        let (sandbox, source_id) = seeded().await;
        let provisioner = Provisioner::new(sandbox.platform(), &LakebridgeConfig {
            project: lakebridge_core::config::ProjectConfig {
                project_ref: " ".into(),
            },
            ..LakebridgeConfig::default()
        });
        let err = provisioner.connect(request(source_id)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Precondition(_)));
    }

    #[tokio::test]
    async fn connect_runs_every_step_in_order() {
        let (sandbox, source_id) = seeded().await;
        sandbox.clear_calls().await;
        let provisioner = Provisioner::new(sandbox.platform(), &config());

        let outcome = provisioner.connect(request(source_id)).await.unwrap();
        assert_eq!(outcome.namespace, "lake_namespace");
        assert_eq!(outcome.connection.warehouse, "lake");
        assert_eq!(
            outcome.expected_catalog_tables(),
            BTreeSet::from(["public_orders_changelog".to_string()])
        );

        assert_eq!(
            sandbox.calls().await,
            vec![
                Operation::CreatePublication,
                Operation::ListWrappers,
                Operation::Decrypt,
                Operation::CreateNamespace,
                Operation::CreateDestinationPipeline,
                Operation::StartPipeline,
            ]
        );

        let destination = &sandbox.destinations().await[0];
        assert_eq!(destination.name, "analytics_lake_destination");
        let DestinationConfig::Iceberg(cfg) = &destination.config;
        assert_eq!(cfg.namespace, "lake_namespace");
        assert_eq!(cfg.s3_region, "us-east-1");
        assert_eq!(cfg.catalog_token, "token-lake");
    }

    #[tokio::test]
    async fn failure_reports_step_resource_and_completed_steps() {
        let (sandbox, source_id) = seeded().await;
        sandbox.fail_once(Operation::CreateDestinationPipeline).await;
        let provisioner = Provisioner::new(sandbox.platform(), &config());

        let err = provisioner.connect(request(source_id)).await.unwrap_err();
        match err {
            OrchestratorError::Provision {
                step,
                resource,
                completed,
                ..
            } => {
                assert_eq!(step, ProvisionStep::CreateDestinationPipeline);
                assert_eq!(resource, "analytics_lake_destination");
                assert_eq!(
                    completed,
                    vec![
                        ProvisionStep::CreatePublication,
                        ProvisionStep::ResolveCredentials,
                        ProvisionStep::CreateNamespace,
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        // Leave-in-place: earlier resources survive.
        assert_eq!(sandbox.publications().await.len(), 1);
        assert!(sandbox.catalog_tables("lake", "lake_namespace").await.is_some());
    }

    #[tokio::test]
    async fn reverse_order_rollback_removes_completed_resources() {
        let (sandbox, source_id) = seeded().await;
        sandbox.fail_once(Operation::StartPipeline).await;
        let provisioner =
            Provisioner::new(sandbox.platform(), &config()).with_rollback(RollbackPolicy::ReverseOrder);

        let err = provisioner.connect(request(source_id)).await.unwrap_err();
        assert_eq!(err.failed_step(), Some(ProvisionStep::StartPipeline));

        assert!(sandbox.publications().await.is_empty());
        assert!(sandbox.pipelines().await.is_empty());
        assert!(sandbox.destinations().await.is_empty());
        assert!(sandbox.catalog_tables("lake", "lake_namespace").await.is_none());
    }

    #[tokio::test]
    async fn progress_callback_sees_each_step() {
        let (sandbox, source_id) = seeded().await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let provisioner = Provisioner::new(sandbox.platform(), &config()).with_callback(Arc::new(
            move |step: ProvisionStep, event: StepEvent| {
                sink.lock().unwrap().push((step, event));
                Box::pin(async {}) as BoxFuture
            },
        ));

        provisioner.connect(request(source_id)).await.unwrap();
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 10);
        assert_eq!(events[0], (ProvisionStep::CreatePublication, StepEvent::Started));
        assert_eq!(events[9], (ProvisionStep::StartPipeline, StepEvent::Completed));
    }
}
