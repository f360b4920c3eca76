//! Table replication toggle: add or remove tables from a bucket's
//! publication, then restart its pipeline.
//!
//! The replication engine does not hot-reload publication changes, so every
//! mutation is followed by a stop-then-start restart. A call that would not
//! change the table set makes no update and no restart.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use lakebridge_core::naming::find_source_table;
use lakebridge_core::*;
use lakebridge_platform::Platform;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::resolver::{AssociatedEntities, ResourceKind, resolve};
use crate::restart::restart_pipeline;

/// Derived replication state of a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableReplicationState {
    /// Never connected: not in the publication, nothing in the catalog.
    Disconnected,
    /// In the publication and the pipeline is started.
    Running,
    /// Removed from the publication; the catalog table and its history remain.
    Disabled,
    /// In the publication but the pipeline is not started.
    Stalled,
}

/// Derive a table's state from the publication, pipeline status, and
/// whether its changelog table exists in the catalog.
pub fn table_state(
    table: &SourceTable,
    publication: Option<&Publication>,
    pipeline_status: Option<PipelineStatus>,
    in_catalog: bool,
) -> TableReplicationState {
    let published = publication.is_some_and(|p| p.contains(table));
    match (published, pipeline_status.is_some_and(PipelineStatus::is_running)) {
        (true, true) => TableReplicationState::Running,
        (true, false) => TableReplicationState::Stalled,
        (false, _) if in_catalog => TableReplicationState::Disabled,
        (false, _) => TableReplicationState::Disconnected,
    }
}

/// Result of a toggle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The table set already had the requested shape.
    Unchanged,
    /// The publication was updated and the pipeline restarted.
    Applied { tables: BTreeSet<SourceTable> },
}

/// The resources a toggle needs, all required.
struct Connection {
    source_id: SourceId,
    publication: Publication,
    pipeline_id: PipelineId,
}

/// Adds and removes tables from a connected bucket's publication.
pub struct TableToggle {
    platform: Platform,
    project_ref: String,
}

impl TableToggle {
    /// Toggle tables of buckets in `project_ref`.
    pub fn new(platform: Platform, project_ref: impl Into<String>) -> Self {
        Self {
            platform,
            project_ref: project_ref.into(),
        }
    }

    /// Start replicating the source table behind `catalog_table`.
    pub async fn enable(&self, bucket: &BucketId, catalog_table: &str) -> OrchestratorResult<ToggleOutcome> {
        let connection = self.connection(bucket).await?;
        let candidates = self
            .platform
            .replication
            .list_tables(&self.project_ref, connection.source_id)
            .await
            .map_err(OrchestratorError::platform("list source tables"))?;
        let table = find_source_table(catalog_table, &candidates)
            .ok_or_else(|| OrchestratorError::UnknownTable(catalog_table.to_string()))?
            .clone();

        if connection.publication.contains(&table) {
            info!(bucket = %bucket, %table, "table already replicated");
            return Ok(ToggleOutcome::Unchanged);
        }
        let mut tables = connection.publication.tables.clone();
        tables.insert(table.clone());
        info!(bucket = %bucket, %table, "enabling replication");
        self.apply(&connection, tables).await
    }

    /// Stop replicating the source table behind `catalog_table`.
    pub async fn disable(&self, bucket: &BucketId, catalog_table: &str) -> OrchestratorResult<ToggleOutcome> {
        let connection = self.connection(bucket).await?;
        let Some(table) = find_source_table(catalog_table, &connection.publication.tables).cloned()
        else {
            info!(bucket = %bucket, %catalog_table, "table not in publication");
            return Ok(ToggleOutcome::Unchanged);
        };

        let mut tables = connection.publication.tables.clone();
        tables.remove(&table);
        info!(bucket = %bucket, %table, "disabling replication");
        self.apply(&connection, tables).await
    }

    /// Connect additional source tables to an existing connection.
    pub async fn add_tables(&self, bucket: &BucketId, requested: &[SourceTable]) -> OrchestratorResult<ToggleOutcome> {
        let connection = self.connection(bucket).await?;
        let replicable: BTreeSet<SourceTable> = self
            .platform
            .replication
            .list_tables(&self.project_ref, connection.source_id)
            .await
            .map_err(OrchestratorError::platform("list source tables"))?
            .into_iter()
            .collect();
        if let Some(unknown) = requested.iter().find(|t| !replicable.contains(t)) {
            return Err(OrchestratorError::UnknownTable(unknown.to_string()));
        }

        let mut tables = connection.publication.tables.clone();
        tables.extend(requested.iter().cloned());
        if tables == connection.publication.tables {
            return Ok(ToggleOutcome::Unchanged);
        }
        info!(bucket = %bucket, added = tables.len() - connection.publication.tables.len(), "adding tables");
        self.apply(&connection, tables).await
    }

    async fn apply(
        &self,
        connection: &Connection,
        tables: BTreeSet<SourceTable>,
    ) -> OrchestratorResult<ToggleOutcome> {
        let name = &connection.publication.name;
        self.platform
            .replication
            .update_publication(&self.project_ref, connection.source_id, name, &tables)
            .await
            .map_err(|source| OrchestratorError::Publication {
                name: name.clone(),
                source,
            })?;

        if let Err(e) = restart_pipeline(
            self.platform.replication.as_ref(),
            &self.project_ref,
            connection.pipeline_id,
        )
        .await
        {
            warn!(publication = %name, error = %e, "publication updated but pipeline restart failed");
            return Err(e);
        }
        Ok(ToggleOutcome::Applied { tables })
    }

    async fn connection(&self, bucket: &BucketId) -> OrchestratorResult<Connection> {
        let entities = resolve(&self.platform, &self.project_ref, bucket).await;
        let source_id = require(&entities, bucket, ResourceKind::Source, entities.source_id)?;
        let publication = require(
            &entities,
            bucket,
            ResourceKind::Publication,
            entities.publication.clone(),
        )?;
        let pipeline = require(
            &entities,
            bucket,
            ResourceKind::Pipeline,
            entities.pipeline.as_ref(),
        )?;
        Ok(Connection {
            source_id,
            pipeline_id: pipeline.id,
            publication,
        })
    }
}

/// A missing member is a lookup error if its lookup failed, otherwise the
/// bucket is simply not connected.
pub(crate) fn require<T>(
    entities: &AssociatedEntities,
    bucket: &BucketId,
    kind: ResourceKind,
    member: Option<T>,
) -> OrchestratorResult<T> {
    member.ok_or_else(|| match entities.failure(kind) {
        Some(failure) => OrchestratorError::Lookup {
            kind,
            source: failure.error.clone(),
        },
        None => OrchestratorError::NotConnected {
            bucket: bucket.to_string(),
            kind,
        },
    })
}
