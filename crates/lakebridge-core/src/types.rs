//! Domain types shared by the platform clients and the orchestrator.
//!
//! Every entity here is owned and persisted by an external subsystem; this
//! crate only mirrors the fields the orchestrator reads or writes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of a replication source (one per project database).
pub type SourceId = u64;

/// Identifier of a replication pipeline.
pub type PipelineId = u64;

/// Identifier of a replication destination.
pub type DestinationId = u64;

/// Identifier of a foreign-data wrapper instance.
pub type WrapperId = u64;

// ── Source tables ──────────────────────────────────────────────────

/// A table in the source database, addressed as `schema.name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceTable {
    pub schema: String,
    pub name: String,
}

impl SourceTable {
    /// `schema.name`, unvalidated.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for SourceTable {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((schema, name))
                if !schema.is_empty() && !name.is_empty() && !name.contains('.') =>
            {
                Ok(Self::new(schema, name))
            }
            _ => Err(CoreError::InvalidTableRef(s.to_string())),
        }
    }
}

// ── Replication ────────────────────────────────────────────────────

/// The project's replication source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationSource {
    pub id: SourceId,
    pub name: String,
}

/// A logical-replication publication: the declared "should-replicate" set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub name: String,
    pub source_id: SourceId,
    pub tables: BTreeSet<SourceTable>,
}

impl Publication {
    /// Whether `table` is one of the published tables.
    pub fn contains(&self, table: &SourceTable) -> bool {
        self.tables.contains(table)
    }
}

/// Lifecycle status of a replication pipeline, as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Starting,
    Started,
    Stopped,
    Failed,
}

impl PipelineStatus {
    pub fn is_running(self) -> bool {
        self == PipelineStatus::Started
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Starting => "starting",
            PipelineStatus::Started => "started",
            PipelineStatus::Stopped => "stopped",
            PipelineStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline moving rows from a publication into a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub replicator_id: u64,
    pub source_id: SourceId,
    pub destination_id: DestinationId,
    pub publication_name: String,
    pub status: PipelineStatus,
}

/// A named sink a pipeline writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    pub config: DestinationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationConfig {
    Iceberg(IcebergDestinationConfig),
}

impl DestinationConfig {
    /// Catalog namespace the destination writes into.
    pub fn namespace(&self) -> &str {
        match self {
            DestinationConfig::Iceberg(cfg) => &cfg.namespace,
        }
    }
}

/// Connection parameters for an Iceberg catalog destination.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcebergDestinationConfig {
    pub project_ref: String,
    pub warehouse_name: String,
    pub namespace: String,
    pub catalog_uri: String,
    pub catalog_token: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_region: String,
}

impl fmt::Debug for IcebergDestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcebergDestinationConfig")
            .field("project_ref", &self.project_ref)
            .field("warehouse_name", &self.warehouse_name)
            .field("namespace", &self.namespace)
            .field("catalog_uri", &self.catalog_uri)
            .field("catalog_token", &"<redacted>")
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field("s3_secret_access_key", &"<redacted>")
            .field("s3_region", &self.s3_region)
            .finish()
    }
}

/// Request body for creating a destination together with its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPipelineRequest {
    pub destination_name: String,
    pub destination_config: DestinationConfig,
    pub source_id: SourceId,
    pub publication_name: String,
}

/// Identifiers returned after creating a destination + pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPipeline {
    pub destination_id: DestinationId,
    pub pipeline_id: PipelineId,
}

// ── Catalog ────────────────────────────────────────────────────────

/// Everything needed to talk to the bucket's catalog.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConnection {
    pub uri: String,
    pub warehouse: String,
    pub token: String,
}

impl fmt::Debug for CatalogConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogConnection")
            .field("uri", &self.uri)
            .field("warehouse", &self.warehouse)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ── Foreign-data wrappers ──────────────────────────────────────────

/// Wrapper server option keys read by the orchestrator.
pub mod wrapper_options {
    pub const CATALOG_URI: &str = "catalog_uri";
    pub const WAREHOUSE: &str = "warehouse";
    pub const REGION: &str = "region_name";
    pub const VAULT_ACCESS_KEY_ID: &str = "vault_aws_access_key_id";
    pub const VAULT_SECRET_ACCESS_KEY: &str = "vault_aws_secret_access_key";
    pub const VAULT_CATALOG_TOKEN: &str = "vault_token";
}

/// An instance of the Iceberg foreign-data wrapper for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperInstance {
    pub id: WrapperId,
    pub name: String,
    pub server_name: String,
    pub server_options: BTreeMap<String, String>,
    pub tables: Vec<ForeignTable>,
}

impl WrapperInstance {
    /// Value of one server option, if set.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.server_options.get(key).map(String::as_str)
    }

    /// Foreign tables whose catalog source lives in `namespace`.
    pub fn tables_in_namespace<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a ForeignTable> + 'a {
        self.tables
            .iter()
            .filter(move |t| t.source_namespace() == Some(namespace))
    }
}

/// A foreign table exposing one catalog table inside the source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignTable {
    pub schema: String,
    pub name: String,
    /// Catalog source in `namespace.table` form.
    pub source: String,
}

impl ForeignTable {
    /// Catalog namespace half of `source` (`{namespace}.{table}`).
    pub fn source_namespace(&self) -> Option<&str> {
        self.source.split_once('.').map(|(ns, _)| ns)
    }

    pub fn source_table(&self) -> Option<&str> {
        self.source.split_once('.').map(|(_, table)| table)
    }
}

// ── Storage credentials ────────────────────────────────────────────

/// An S3 access key scoped to an analytics bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3AccessKey {
    pub id: String,
    pub description: String,
}
