//! Namespace maintenance: what a catalog namespace holds, and the two
//! operations that change its foreign-table mapping.
//!
//! - **overview**: connected tables (with a foreign table), unconnected
//!   catalog tables, and published tables the replicator has not created yet
//! - **rescan**: re-import the namespace into its foreign schema
//! - **delete**: drop every catalog table, every foreign table, then the
//!   namespace itself; the wrapper's table list is rewritten without them

use serde::Serialize;
use tracing::{info, warn};

use lakebridge_core::naming::{changelog_table_name, find_source_table, foreign_schema_name};
use lakebridge_core::*;
use lakebridge_platform::Platform;

use crate::credentials::{CatalogCredentials, credentials_from_wrapper};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::resolver::{AssociatedEntities, ResourceKind, resolve};
use crate::toggle::{TableReplicationState, require, table_state};

/// A catalog table exposed through a foreign table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedTable {
    pub catalog_table: String,
    pub foreign_table: ForeignTable,
    /// Source table this catalog table replicates, when it can be traced back.
    pub source_table: Option<SourceTable>,
    pub state: TableReplicationState,
}

/// Contents of one catalog namespace as seen through the bucket's wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceOverview {
    pub namespace: String,
    pub foreign_schema: String,
    pub connected: Vec<ConnectedTable>,
    /// Catalog tables with no foreign table.
    pub unconnected: Vec<String>,
    /// Published tables whose changelog table does not exist yet.
    pub awaiting: Vec<SourceTable>,
}

/// Inspection and cleanup of a bucket's catalog namespaces.
pub struct NamespaceMaintenance {
    platform: Platform,
    project_ref: String,
    default_region: String,
}

impl NamespaceMaintenance {
    /// Build from the project ref and default region in `config`.
    pub fn new(platform: Platform, config: &LakebridgeConfig) -> Self {
        Self {
            platform,
            project_ref: config.project.project_ref.clone(),
            default_region: config.catalog.default_region.clone(),
        }
    }

    /// Classify the namespace's catalog tables and the published tables
    /// still awaiting creation.
    pub async fn overview(&self, bucket: &BucketId, namespace: &str) -> OrchestratorResult<NamespaceOverview> {
        let entities = resolve(&self.platform, &self.project_ref, bucket).await;
        let wrapper = require(&entities, bucket, ResourceKind::Wrapper, entities.wrapper.as_ref())?;
        let credentials = self.credentials(bucket, wrapper).await?;

        let catalog_tables = self
            .platform
            .catalog
            .list_tables(&credentials.connection, namespace)
            .await
            .map_err(OrchestratorError::platform("list catalog tables"))?;

        let publication = entities.publication.as_ref();
        let status = entities.pipeline.as_ref().map(|p| p.status);
        let published: Vec<SourceTable> = publication
            .map(|p| p.tables.iter().cloned().collect())
            .unwrap_or_default();

        let mut connected = Vec::new();
        let mut unconnected = Vec::new();
        for catalog_table in &catalog_tables {
            let source = format!("{namespace}.{catalog_table}");
            match wrapper.tables.iter().find(|t| t.source == source) {
                Some(foreign_table) => {
                    let source_table = find_source_table(catalog_table, &published).cloned();
                    let state = match &source_table {
                        Some(table) => table_state(table, publication, status, true),
                        None => TableReplicationState::Disabled,
                    };
                    connected.push(ConnectedTable {
                        catalog_table: catalog_table.clone(),
                        foreign_table: foreign_table.clone(),
                        source_table,
                        state,
                    });
                }
                None => unconnected.push(catalog_table.clone()),
            }
        }

        let awaiting = published
            .iter()
            .filter(|t| !catalog_tables.contains(&changelog_table_name(t)))
            .cloned()
            .collect();

        Ok(NamespaceOverview {
            namespace: namespace.to_string(),
            foreign_schema: foreign_schema_name(namespace),
            connected,
            unconnected,
            awaiting,
        })
    }

    /// Re-import the namespace so new catalog tables get foreign tables.
    pub async fn rescan(&self, bucket: &BucketId, namespace: &str) -> OrchestratorResult<()> {
        let entities = resolve(&self.platform, &self.project_ref, bucket).await;
        let wrapper = require(&entities, bucket, ResourceKind::Wrapper, entities.wrapper.as_ref())?;
        let schema = foreign_schema_name(namespace);

        self.platform
            .wrappers
            .import_foreign_schema(&self.project_ref, &wrapper.server_name, namespace, &schema)
            .await
            .map_err(OrchestratorError::platform("import foreign schema"))?;
        info!(bucket = %bucket, %namespace, %schema, "foreign schema rescanned");
        Ok(())
    }

    /// Drop the namespace with all of its catalog and foreign tables.
    pub async fn delete_namespace(&self, bucket: &BucketId, namespace: &str) -> OrchestratorResult<()> {
        let entities = resolve(&self.platform, &self.project_ref, bucket).await;
        let wrapper = require(&entities, bucket, ResourceKind::Wrapper, entities.wrapper.as_ref())?;
        let credentials = self.credentials(bucket, wrapper).await?;
        let connection = &credentials.connection;
        let catalog = &self.platform.catalog;

        let tables = catalog
            .list_tables(connection, namespace)
            .await
            .map_err(OrchestratorError::platform("list catalog tables"))?;
        for table in &tables {
            catalog
                .drop_table(connection, namespace, table)
                .await
                .map_err(OrchestratorError::platform("drop catalog table"))?;
        }

        for foreign_table in wrapper.tables_in_namespace(namespace) {
            self.platform
                .wrappers
                .drop_foreign_table(&self.project_ref, &foreign_table.schema, &foreign_table.name)
                .await
                .map_err(OrchestratorError::platform("drop foreign table"))?;
        }

        let mut remaining = wrapper.clone();
        remaining
            .tables
            .retain(|t| t.source_namespace() != Some(namespace));
        if remaining.tables.len() != wrapper.tables.len() {
            self.platform
                .wrappers
                .update_wrapper(&self.project_ref, &remaining)
                .await
                .map_err(OrchestratorError::platform("update wrapper tables"))?;
        }

        catalog
            .drop_namespace(connection, namespace)
            .await
            .map_err(OrchestratorError::platform("drop namespace"))?;

        warn_if_publishing(&entities, bucket, namespace);
        info!(bucket = %bucket, %namespace, tables = tables.len(), "namespace deleted");
        Ok(())
    }

    async fn credentials(&self, bucket: &BucketId, wrapper: &WrapperInstance) -> OrchestratorResult<CatalogCredentials> {
        credentials_from_wrapper(&self.platform, &self.project_ref, bucket, wrapper, &self.default_region)
            .await
            .map_err(OrchestratorError::platform("resolve catalog credentials"))
    }
}

fn warn_if_publishing(entities: &AssociatedEntities, bucket: &BucketId, namespace: &str) {
    let writes_here = entities
        .destination
        .as_ref()
        .is_some_and(|d| d.config.namespace() == namespace);
    let running = entities
        .pipeline
        .as_ref()
        .is_some_and(|p| p.status.is_running());
    if writes_here && running {
        warn!(bucket = %bucket, %namespace, "namespace deleted while its pipeline is running");
    }
}
