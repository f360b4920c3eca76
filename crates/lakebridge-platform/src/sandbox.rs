//! Sandbox: an in-memory platform implementing every collaborator trait.
//!
//! Used by tests and by `lakebridge rehearse`. On top of plain CRUD it
//! simulates the two behaviours the orchestrator has to cope with:
//!
//! - **Injected failures**: any [`Operation`] can be made to fail once or
//!   always, to exercise partial-failure paths.
//! - **An out-of-band replicator**: once a pipeline is started, the
//!   changelog tables for its publication appear in the destination's
//!   catalog namespace only after `replicator_lag` catalog listings.
//!
//! Every call is recorded, so tests can assert on ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use lakebridge_core::naming::changelog_table_name;
use lakebridge_core::types::wrapper_options;
use lakebridge_core::*;

use crate::catalog::CatalogClient;
use crate::credentials::StorageCredentials;
use crate::error::{PlatformError, PlatformResult};
use crate::replication::ReplicationControlPlane;
use crate::secrets::SecretStore;
use crate::wrappers::ForeignDataManager;
use crate::Platform;

/// Every collaborator call the sandbox understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListSources,
    CreateTenantSource,
    ListSourceTables,
    ListPublications,
    CreatePublication,
    UpdatePublication,
    DeletePublication,
    ListDestinations,
    ListPipelines,
    CreateDestinationPipeline,
    DeleteDestinationPipeline,
    StartPipeline,
    StopPipeline,
    PipelineStatus,
    CreateNamespace,
    ListNamespaces,
    DropNamespace,
    ListCatalogTables,
    DropCatalogTable,
    Decrypt,
    ListWrappers,
    UpdateWrapper,
    DeleteWrapper,
    ImportForeignSchema,
    DropForeignTable,
    ListAccessKeys,
    CreateAccessKey,
    DeleteAccessKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Once,
    Always,
}

#[derive(Default)]
struct SandboxState {
    next_id: u64,
    sources: Vec<ReplicationSource>,
    source_tables: HashMap<SourceId, Vec<SourceTable>>,
    publications: BTreeMap<(SourceId, String), Publication>,
    destinations: BTreeMap<DestinationId, Destination>,
    pipelines: BTreeMap<PipelineId, Pipeline>,
    /// (warehouse, namespace) → table names.
    namespaces: BTreeMap<(String, String), BTreeSet<String>>,
    secrets: HashMap<String, String>,
    wrappers: BTreeMap<WrapperId, WrapperInstance>,
    access_keys: Vec<S3AccessKey>,
    failures: HashMap<Operation, FailureMode>,
    calls: Vec<Operation>,
    /// Catalog listings left before a started pipeline materializes tables.
    replicator_pending: HashMap<PipelineId, u32>,
    /// Status polls left before a starting pipeline reports `started`.
    starting: HashMap<PipelineId, u32>,
}

impl SandboxState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Record the call and apply any injected failure.
    fn enter(&mut self, op: Operation) -> PlatformResult<()> {
        self.calls.push(op);
        match self.failures.get(&op).copied() {
            Some(FailureMode::Once) => {
                self.failures.remove(&op);
                Err(PlatformError::Unavailable(format!("injected failure: {op:?}")))
            }
            Some(FailureMode::Always) => {
                Err(PlatformError::Unavailable(format!("injected failure: {op:?}")))
            }
            None => Ok(()),
        }
    }

    /// Run one step of the simulated replicator.
    fn advance_replicator(&mut self) {
        let running: Vec<PipelineId> = self
            .pipelines
            .values()
            .filter(|p| p.status == PipelineStatus::Started)
            .map(|p| p.id)
            .collect();

        for pipeline_id in running {
            let pending = self.replicator_pending.entry(pipeline_id).or_insert(0);
            if *pending > 0 {
                *pending -= 1;
                continue;
            }
            self.materialize(pipeline_id);
        }
    }

    fn materialize(&mut self, pipeline_id: PipelineId) {
        let Some(pipeline) = self.pipelines.get(&pipeline_id) else {
            return;
        };
        let Some(destination) = self.destinations.get(&pipeline.destination_id) else {
            return;
        };
        let DestinationConfig::Iceberg(cfg) = &destination.config;
        let key = (cfg.warehouse_name.clone(), cfg.namespace.clone());
        let Some(publication) = self
            .publications
            .get(&(pipeline.source_id, pipeline.publication_name.clone()))
        else {
            return;
        };
        let names: Vec<String> = publication.tables.iter().map(changelog_table_name).collect();

        let tables = self.namespaces.entry(key).or_default();
        for name in names {
            if tables.insert(name.clone()) {
                debug!(pipeline_id, table = %name, "sandbox replicator created table");
            }
        }
    }
}

/// Timing knobs for the simulated replicator.
#[derive(Debug, Clone, Copy, Default)]
struct SandboxSettings {
    replicator_lag: u32,
    startup_polls: u32,
}

/// In-memory platform. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct Sandbox {
    state: Arc<Mutex<SandboxState>>,
    settings: SandboxSettings,
}

impl Sandbox {
    /// An empty project with no lag and immediate pipeline startup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog listings a started pipeline waits before its
    /// tables appear.
    pub fn with_replicator_lag(mut self, listings: u32) -> Self {
        self.settings.replicator_lag = listings;
        self
    }

    /// Number of status polls a pipeline reports `starting` before `started`.
    pub fn with_startup_polls(mut self, polls: u32) -> Self {
        self.settings.startup_polls = polls;
        self
    }

    /// Bundle this sandbox as every collaborator.
    pub fn platform(&self) -> Platform {
        Platform {
            replication: Arc::new(self.clone()),
            catalog: Arc::new(self.clone()),
            secrets: Arc::new(self.clone()),
            wrappers: Arc::new(self.clone()),
            credentials: Arc::new(self.clone()),
        }
    }

    // ── Failure injection ──────────────────────────────────────────

    pub async fn fail_once(&self, op: Operation) {
        self.state.lock().await.failures.insert(op, FailureMode::Once);
    }

    pub async fn fail_always(&self, op: Operation) {
        self.state.lock().await.failures.insert(op, FailureMode::Always);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    // ── Seeding ────────────────────────────────────────────────────

    /// Register the project's replication source and its replicable tables.
    pub async fn seed_source(
        &self,
        project_ref: &str,
        tables: impl IntoIterator<Item = SourceTable>,
    ) -> SourceId {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.sources.push(ReplicationSource {
            id,
            name: project_ref.to_string(),
        });
        state.source_tables.insert(id, tables.into_iter().collect());
        id
    }

    /// Create what bucket creation leaves behind: the Iceberg wrapper
    /// instance (with secret-store references) and the bucket's S3 key.
    pub async fn seed_analytics_bucket(
        &self,
        bucket: &BucketId,
        catalog_uri: &str,
    ) -> WrapperInstance {
        let names = ResourceNames::derive(bucket);
        let mut state = self.state.lock().await;

        let access_key_id = format!("vault-{}-access-key-id", names.bucket);
        let secret_access_key = format!("vault-{}-secret-access-key", names.bucket);
        let catalog_token = format!("vault-{}-catalog-token", names.bucket);
        state
            .secrets
            .insert(access_key_id.clone(), format!("AKIA{}", bucket.normalized().to_uppercase()));
        state
            .secrets
            .insert(secret_access_key.clone(), format!("secret-{}", bucket.normalized()));
        state
            .secrets
            .insert(catalog_token.clone(), format!("token-{}", bucket.normalized()));

        let server_options = BTreeMap::from([
            (wrapper_options::CATALOG_URI.to_string(), catalog_uri.to_string()),
            (wrapper_options::WAREHOUSE.to_string(), bucket.to_string()),
            (wrapper_options::VAULT_ACCESS_KEY_ID.to_string(), access_key_id),
            (wrapper_options::VAULT_SECRET_ACCESS_KEY.to_string(), secret_access_key),
            (wrapper_options::VAULT_CATALOG_TOKEN.to_string(), catalog_token),
        ]);
        let wrapper = WrapperInstance {
            id: state.next_id(),
            name: names.wrapper.clone(),
            server_name: names.fdw_server.clone(),
            server_options,
            tables: Vec::new(),
        };
        state.wrappers.insert(wrapper.id, wrapper.clone());

        let key_id = state.next_id();
        state.access_keys.push(S3AccessKey {
            id: format!("key-{key_id}"),
            description: names.s3_access_key,
        });
        wrapper
    }

    pub async fn remove_secret(&self, id: &str) {
        self.state.lock().await.secrets.remove(id);
    }

    /// Create a catalog table out-of-band, as an Iceberg client would.
    pub async fn insert_catalog_table(&self, warehouse: &str, namespace: &str, table: &str) {
        self.state
            .lock()
            .await
            .namespaces
            .entry((warehouse.to_string(), namespace.to_string()))
            .or_default()
            .insert(table.to_string());
    }

    pub async fn set_pipeline_status(&self, pipeline_id: PipelineId, status: PipelineStatus) {
        if let Some(p) = self.state.lock().await.pipelines.get_mut(&pipeline_id) {
            p.status = status;
        }
    }

    // ── Inspection ─────────────────────────────────────────────────

    pub async fn calls(&self) -> Vec<Operation> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn publications(&self) -> Vec<Publication> {
        self.state.lock().await.publications.values().cloned().collect()
    }

    pub async fn destinations(&self) -> Vec<Destination> {
        self.state.lock().await.destinations.values().cloned().collect()
    }

    pub async fn pipelines(&self) -> Vec<Pipeline> {
        self.state.lock().await.pipelines.values().cloned().collect()
    }

    pub async fn wrappers(&self) -> Vec<WrapperInstance> {
        self.state.lock().await.wrappers.values().cloned().collect()
    }

    pub async fn access_keys(&self) -> Vec<S3AccessKey> {
        self.state.lock().await.access_keys.clone()
    }

    /// Tables of a catalog namespace, without advancing the replicator.
    pub async fn catalog_tables(&self, warehouse: &str, namespace: &str) -> Option<BTreeSet<String>> {
        self.state
            .lock()
            .await
            .namespaces
            .get(&(warehouse.to_string(), namespace.to_string()))
            .cloned()
    }
}

// ── Replication ────────────────────────────────────────────────────

#[async_trait]
impl ReplicationControlPlane for Sandbox {
    async fn list_sources(&self, project_ref: &str) -> PlatformResult<Vec<ReplicationSource>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListSources)?;
        Ok(state
            .sources
            .iter()
            .filter(|s| s.name == project_ref)
            .cloned()
            .collect())
    }

    async fn create_tenant_source(&self, project_ref: &str) -> PlatformResult<SourceId> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreateTenantSource)?;
        if state.sources.iter().any(|s| s.name == project_ref) {
            return Err(PlatformError::already_exists("source", project_ref));
        }
        let id = state.next_id();
        state.sources.push(ReplicationSource {
            id,
            name: project_ref.to_string(),
        });
        state.source_tables.entry(id).or_default();
        Ok(id)
    }

    async fn list_tables(
        &self,
        _project_ref: &str,
        source_id: SourceId,
    ) -> PlatformResult<Vec<SourceTable>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListSourceTables)?;
        state
            .source_tables
            .get(&source_id)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("source", source_id.to_string()))
    }

    async fn list_publications(
        &self,
        _project_ref: &str,
        source_id: SourceId,
    ) -> PlatformResult<Vec<Publication>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListPublications)?;
        Ok(state
            .publications
            .values()
            .filter(|p| p.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn create_publication(
        &self,
        _project_ref: &str,
        source_id: SourceId,
        name: &str,
        tables: &BTreeSet<SourceTable>,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreatePublication)?;
        let key = (source_id, name.to_string());
        if state.publications.contains_key(&key) {
            return Err(PlatformError::already_exists("publication", name));
        }
        state.publications.insert(
            key,
            Publication {
                name: name.to_string(),
                source_id,
                tables: tables.clone(),
            },
        );
        Ok(())
    }

    async fn update_publication(
        &self,
        _project_ref: &str,
        source_id: SourceId,
        name: &str,
        tables: &BTreeSet<SourceTable>,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::UpdatePublication)?;
        let publication = state
            .publications
            .get_mut(&(source_id, name.to_string()))
            .ok_or_else(|| PlatformError::not_found("publication", name))?;
        publication.tables = tables.clone();
        Ok(())
    }

    async fn delete_publication(
        &self,
        _project_ref: &str,
        source_id: SourceId,
        name: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DeletePublication)?;
        state
            .publications
            .remove(&(source_id, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| PlatformError::not_found("publication", name))
    }

    async fn list_destinations(&self, _project_ref: &str) -> PlatformResult<Vec<Destination>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListDestinations)?;
        Ok(state.destinations.values().cloned().collect())
    }

    async fn list_pipelines(&self, _project_ref: &str) -> PlatformResult<Vec<Pipeline>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListPipelines)?;
        Ok(state.pipelines.values().cloned().collect())
    }

    async fn create_destination_pipeline(
        &self,
        _project_ref: &str,
        request: &DestinationPipelineRequest,
    ) -> PlatformResult<CreatedPipeline> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreateDestinationPipeline)?;
        if state
            .destinations
            .values()
            .any(|d| d.name == request.destination_name)
        {
            return Err(PlatformError::already_exists(
                "destination",
                &request.destination_name,
            ));
        }

        let destination_id = state.next_id();
        let pipeline_id = state.next_id();
        let replicator_id = state.next_id();
        state.destinations.insert(
            destination_id,
            Destination {
                id: destination_id,
                name: request.destination_name.clone(),
                config: request.destination_config.clone(),
            },
        );
        state.pipelines.insert(
            pipeline_id,
            Pipeline {
                id: pipeline_id,
                replicator_id,
                source_id: request.source_id,
                destination_id,
                publication_name: request.publication_name.clone(),
                status: PipelineStatus::Stopped,
            },
        );
        Ok(CreatedPipeline {
            destination_id,
            pipeline_id,
        })
    }

    async fn delete_destination_pipeline(
        &self,
        _project_ref: &str,
        destination_id: DestinationId,
        pipeline_id: PipelineId,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DeleteDestinationPipeline)?;
        let pipeline = state.pipelines.remove(&pipeline_id);
        let destination = state.destinations.remove(&destination_id);
        state.replicator_pending.remove(&pipeline_id);
        state.starting.remove(&pipeline_id);
        if pipeline.is_none() && destination.is_none() {
            return Err(PlatformError::not_found(
                "pipeline",
                pipeline_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn start_pipeline(&self, _project_ref: &str, pipeline_id: PipelineId) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::StartPipeline)?;
        let SandboxSettings {
            replicator_lag,
            startup_polls,
        } = self.settings;
        let pipeline = state
            .pipelines
            .get_mut(&pipeline_id)
            .ok_or_else(|| PlatformError::not_found("pipeline", pipeline_id.to_string()))?;
        if startup_polls == 0 {
            pipeline.status = PipelineStatus::Started;
        } else {
            pipeline.status = PipelineStatus::Starting;
            state.starting.insert(pipeline_id, startup_polls);
        }
        state.replicator_pending.insert(pipeline_id, replicator_lag);
        Ok(())
    }

    async fn stop_pipeline(&self, _project_ref: &str, pipeline_id: PipelineId) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::StopPipeline)?;
        let pipeline = state
            .pipelines
            .get_mut(&pipeline_id)
            .ok_or_else(|| PlatformError::not_found("pipeline", pipeline_id.to_string()))?;
        pipeline.status = PipelineStatus::Stopped;
        state.starting.remove(&pipeline_id);
        Ok(())
    }

    async fn pipeline_status(
        &self,
        _project_ref: &str,
        pipeline_id: PipelineId,
    ) -> PlatformResult<PipelineStatus> {
        let mut state = self.state.lock().await;
        state.enter(Operation::PipelineStatus)?;
        if let Some(left) = state.starting.get_mut(&pipeline_id) {
            *left = left.saturating_sub(1);
            if *left == 0 {
                state.starting.remove(&pipeline_id);
                if let Some(p) = state.pipelines.get_mut(&pipeline_id) {
                    p.status = PipelineStatus::Started;
                }
            }
        }
        state
            .pipelines
            .get(&pipeline_id)
            .map(|p| p.status)
            .ok_or_else(|| PlatformError::not_found("pipeline", pipeline_id.to_string()))
    }
}

// ── Catalog ────────────────────────────────────────────────────────

#[async_trait]
impl CatalogClient for Sandbox {
    async fn create_namespace(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreateNamespace)?;
        let key = (connection.warehouse.clone(), namespace.to_string());
        if state.namespaces.contains_key(&key) {
            return Err(PlatformError::already_exists("namespace", namespace));
        }
        state.namespaces.insert(key, BTreeSet::new());
        Ok(())
    }

    async fn list_namespaces(&self, connection: &CatalogConnection) -> PlatformResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListNamespaces)?;
        state.advance_replicator();
        Ok(state
            .namespaces
            .keys()
            .filter(|(warehouse, _)| *warehouse == connection.warehouse)
            .map(|(_, namespace)| namespace.clone())
            .collect())
    }

    async fn drop_namespace(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DropNamespace)?;
        let key = (connection.warehouse.clone(), namespace.to_string());
        match state.namespaces.get(&key) {
            None => Err(PlatformError::not_found("namespace", namespace)),
            Some(tables) if !tables.is_empty() => Err(PlatformError::Rejected(format!(
                "namespace {namespace} is not empty"
            ))),
            Some(_) => {
                state.namespaces.remove(&key);
                Ok(())
            }
        }
    }

    async fn list_tables(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<Vec<String>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListCatalogTables)?;
        state.advance_replicator();
        state
            .namespaces
            .get(&(connection.warehouse.clone(), namespace.to_string()))
            .map(|tables| tables.iter().cloned().collect())
            .ok_or_else(|| PlatformError::not_found("namespace", namespace))
    }

    async fn drop_table(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
        table: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DropCatalogTable)?;
        let tables = state
            .namespaces
            .get_mut(&(connection.warehouse.clone(), namespace.to_string()))
            .ok_or_else(|| PlatformError::not_found("namespace", namespace))?;
        if tables.remove(table) {
            Ok(())
        } else {
            Err(PlatformError::not_found("table", table))
        }
    }
}

// ── Secrets ────────────────────────────────────────────────────────

#[async_trait]
impl SecretStore for Sandbox {
    async fn decrypt(
        &self,
        _project_ref: &str,
        ids: &[String],
    ) -> PlatformResult<HashMap<String, String>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::Decrypt)?;
        Ok(ids
            .iter()
            .filter_map(|id| state.secrets.get(id).map(|v| (id.clone(), v.clone())))
            .collect())
    }
}

// ── Wrappers ───────────────────────────────────────────────────────

#[async_trait]
impl ForeignDataManager for Sandbox {
    async fn list_wrappers(&self, _project_ref: &str) -> PlatformResult<Vec<WrapperInstance>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListWrappers)?;
        Ok(state.wrappers.values().cloned().collect())
    }

    async fn update_wrapper(
        &self,
        _project_ref: &str,
        wrapper: &WrapperInstance,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::UpdateWrapper)?;
        let existing = state
            .wrappers
            .get_mut(&wrapper.id)
            .ok_or_else(|| PlatformError::not_found("wrapper", &wrapper.name))?;
        *existing = wrapper.clone();
        Ok(())
    }

    async fn delete_wrapper(&self, _project_ref: &str, wrapper_id: WrapperId) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DeleteWrapper)?;
        state
            .wrappers
            .remove(&wrapper_id)
            .map(|_| ())
            .ok_or_else(|| PlatformError::not_found("wrapper", wrapper_id.to_string()))
    }

    async fn import_foreign_schema(
        &self,
        _project_ref: &str,
        server_name: &str,
        source_schema: &str,
        target_schema: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ImportForeignSchema)?;
        let wrapper_id = state
            .wrappers
            .values()
            .find(|w| w.server_name == server_name)
            .map(|w| w.id)
            .ok_or_else(|| PlatformError::not_found("foreign server", server_name))?;
        let warehouse = state.wrappers[&wrapper_id]
            .option(wrapper_options::WAREHOUSE)
            .unwrap_or_default()
            .to_string();
        let catalog_tables = state
            .namespaces
            .get(&(warehouse, source_schema.to_string()))
            .cloned()
            .ok_or_else(|| PlatformError::not_found("namespace", source_schema))?;

        let Some(wrapper) = state.wrappers.get_mut(&wrapper_id) else {
            return Err(PlatformError::not_found("foreign server", server_name));
        };
        for table in catalog_tables {
            let source = format!("{source_schema}.{table}");
            if !wrapper.tables.iter().any(|t| t.source == source) {
                wrapper.tables.push(ForeignTable {
                    schema: target_schema.to_string(),
                    name: table,
                    source,
                });
            }
        }
        debug!(server = %server_name, schema = %target_schema, "sandbox imported foreign schema");
        Ok(())
    }

    async fn drop_foreign_table(
        &self,
        _project_ref: &str,
        schema: &str,
        table: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DropForeignTable)?;
        for wrapper in state.wrappers.values_mut() {
            let before = wrapper.tables.len();
            wrapper
                .tables
                .retain(|t| !(t.schema == schema && t.name == table));
            if wrapper.tables.len() != before {
                return Ok(());
            }
        }
        Err(PlatformError::not_found(
            "foreign table",
            format!("{schema}.{table}"),
        ))
    }
}

// ── Storage credentials ────────────────────────────────────────────

#[async_trait]
impl StorageCredentials for Sandbox {
    async fn list_access_keys(&self, _project_ref: &str) -> PlatformResult<Vec<S3AccessKey>> {
        let mut state = self.state.lock().await;
        state.enter(Operation::ListAccessKeys)?;
        Ok(state.access_keys.clone())
    }

    async fn create_access_key(
        &self,
        _project_ref: &str,
        description: &str,
    ) -> PlatformResult<S3AccessKey> {
        let mut state = self.state.lock().await;
        state.enter(Operation::CreateAccessKey)?;
        let id = state.next_id();
        let key = S3AccessKey {
            id: format!("key-{id}"),
            description: description.to_string(),
        };
        state.access_keys.push(key.clone());
        Ok(key)
    }

    async fn delete_access_key(&self, _project_ref: &str, key_id: &str) -> PlatformResult<()> {
        let mut state = self.state.lock().await;
        state.enter(Operation::DeleteAccessKey)?;
        let before = state.access_keys.len();
        state.access_keys.retain(|k| k.id != key_id);
        if state.access_keys.len() == before {
            return Err(PlatformError::not_found("access key", key_id));
        }
        Ok(())
    }
}
