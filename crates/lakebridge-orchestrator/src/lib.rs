//! lakebridge-orchestrator: wires analytics buckets to an Iceberg catalog
//! and keeps the connection in sync.
//!
//! # Components
//!
//! - **`resolver`**: name-matched discovery of a bucket's dependent resources
//! - **`provisioner`**: the five-step connect saga
//! - **`poller`**: cancellable reconciliation of declared vs. observed tables
//! - **`toggle`**: per-table enable/disable with pipeline restart
//! - **`restart`**: stop-then-start pipeline restart
//! - **`teardown`**: best-effort deletion with a per-resource report
//! - **`namespace`**: namespace overview, foreign-schema rescan, deletion
//! - **`pipeline_watch`**: wait for a pipeline to report started
//! - **`source`**: locate or create the project's replication source
//! - **`credentials`**: catalog credentials and the bucket's S3 access key
//!
//! ```text
//! connect ──▶ Provisioner ──▶ ProvisionOutcome ──▶ ReconciliationHandle
//!                                                        │ polls
//! enable/disable ──▶ resolve ──▶ publication ──▶ restart ▼
//! teardown ───────▶ resolve ──▶ 4 × delete       CatalogClient
//! ```

pub mod credentials;
pub mod error;
pub mod namespace;
pub mod pipeline_watch;
pub mod poller;
pub mod provisioner;
pub mod resolver;
pub mod restart;
pub mod source;
pub mod teardown;
pub mod toggle;

use std::collections::BTreeSet;

use lakebridge_core::naming::namespace_name;
use lakebridge_core::{BucketId, CatalogConnection, LakebridgeConfig, S3AccessKey, SourceId};
use lakebridge_platform::Platform;

pub use error::{OrchestratorError, OrchestratorResult};
pub use namespace::{NamespaceMaintenance, NamespaceOverview};
pub use pipeline_watch::PipelineWatch;
pub use poller::{
    PollPhase, ReconciliationHandle, ReconciliationState, ReconciliationStatus,
    ReconciliationTarget, TickOutcome,
};
pub use provisioner::{ConnectRequest, ProvisionOutcome, ProvisionStep, Provisioner, StepEvent};
pub use resolver::{AssociatedEntities, LookupFailure, ResourceKind, resolve};
pub use restart::{RestartPhase, restart_pipeline};
pub use teardown::{TeardownOutcome, TeardownReport, TeardownResource};
pub use toggle::{TableReplicationState, TableToggle, ToggleOutcome};

/// Entry point bundling a [`Platform`] with its configuration.
#[derive(Clone)]
pub struct Orchestrator {
    platform: Platform,
    config: LakebridgeConfig,
}

impl Orchestrator {
    /// Create an orchestrator over `platform`.
    pub fn new(platform: Platform, config: LakebridgeConfig) -> Self {
        Self { platform, config }
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &LakebridgeConfig {
        &self.config
    }

    fn project_ref(&self) -> &str {
        &self.config.project.project_ref
    }

    /// Discover every dependent resource of `bucket`.
    pub async fn resolve(&self, bucket: &BucketId) -> AssociatedEntities {
        resolver::resolve(&self.platform, self.project_ref(), bucket).await
    }

    /// Locate or create the project's replication source.
    pub async fn enable_replication(&self) -> OrchestratorResult<SourceId> {
        source::ensure_replication_source(self.platform.replication.as_ref(), self.project_ref())
            .await
    }

    /// Locate or create the bucket's `{n}_keys` S3 access key.
    pub async fn ensure_access_key(&self, bucket: &BucketId) -> OrchestratorResult<S3AccessKey> {
        credentials::ensure_bucket_access_key(
            self.platform.credentials.as_ref(),
            self.project_ref(),
            bucket,
        )
        .await
        .map_err(OrchestratorError::platform("ensure s3 access key"))
    }

    /// A provisioner configured from this orchestrator.
    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(self.platform.clone(), &self.config)
    }

    /// Poll the outcome's namespace until every requested table appears.
    pub fn reconcile_tables(&self, outcome: &ProvisionOutcome) -> ReconciliationHandle {
        ReconciliationHandle::spawn(
            self.platform.catalog.clone(),
            ReconciliationTarget::NamespaceTables {
                connection: outcome.connection.clone(),
                namespace: outcome.namespace.clone(),
            },
            ReconciliationState::for_source_tables(
                &outcome.tables,
                self.config.reconciliation.poll_interval(),
            ),
        )
    }

    /// Poll the bucket's namespace until every table currently in its
    /// publication appears. Use after `enable` or `add_tables`, when the
    /// table set no longer matches the original [`ProvisionOutcome`].
    pub async fn reconcile_bucket(&self, bucket: &BucketId) -> OrchestratorResult<ReconciliationHandle> {
        let entities = self.resolve(bucket).await;
        let wrapper = toggle::require(&entities, bucket, ResourceKind::Wrapper, entities.wrapper.as_ref())?;
        let publication = toggle::require(
            &entities,
            bucket,
            ResourceKind::Publication,
            entities.publication.as_ref(),
        )?;
        let credentials = credentials::credentials_from_wrapper(
            &self.platform,
            self.project_ref(),
            bucket,
            wrapper,
            &self.config.catalog.default_region,
        )
        .await
        .map_err(OrchestratorError::platform("resolve catalog credentials"))?;
        let namespace = entities
            .destination
            .as_ref()
            .map(|d| d.config.namespace().to_string())
            .unwrap_or_else(|| namespace_name(bucket));

        Ok(ReconciliationHandle::spawn(
            self.platform.catalog.clone(),
            ReconciliationTarget::NamespaceTables {
                connection: credentials.connection,
                namespace,
            },
            ReconciliationState::for_source_tables(
                &publication.tables,
                self.config.reconciliation.poll_interval(),
            ),
        ))
    }

    /// Poll the warehouse until every declared namespace appears.
    pub fn reconcile_namespaces(
        &self,
        connection: CatalogConnection,
        namespaces: BTreeSet<String>,
    ) -> ReconciliationHandle {
        ReconciliationHandle::spawn(
            self.platform.catalog.clone(),
            ReconciliationTarget::Namespaces { connection },
            ReconciliationState::new(namespaces, self.config.reconciliation.poll_interval()),
        )
    }

    /// Per-table enable/disable for this project.
    pub fn toggle(&self) -> TableToggle {
        TableToggle::new(self.platform.clone(), self.project_ref())
    }

    /// Namespace overview, rescan, and deletion.
    pub fn namespaces(&self) -> NamespaceMaintenance {
        NamespaceMaintenance::new(self.platform.clone(), &self.config)
    }

    /// A status watch using the configured poll interval.
    pub fn pipeline_watch(&self) -> PipelineWatch {
        PipelineWatch::new(
            self.platform.replication.clone(),
            self.project_ref(),
            self.config.pipeline.status_poll_interval(),
        )
    }

    /// Best-effort deletion of everything `bucket` owned.
    pub async fn teardown(&self, bucket: &BucketId) -> TeardownReport {
        teardown::teardown(&self.platform, self.project_ref(), bucket).await
    }
}
