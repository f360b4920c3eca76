//! lakebridge-platform: the external subsystems the orchestrator drives.
//!
//! Each subsystem is an async trait. None of them share a transaction
//! boundary with another; the orchestrator only ever sees them through
//! these seams.
//!
//! # Components
//!
//! - **`replication`**: publications, destinations, pipelines, sources
//! - **`catalog`**: Iceberg catalog namespaces and tables
//! - **`secrets`**: batch secret decryption
//! - **`wrappers`**: foreign-data wrapper instances and foreign schemas
//! - **`credentials`**: bucket-scoped S3 access keys
//! - **`sandbox`**: in-memory implementation of all of the above
//!
//! ```text
//! Platform
//!   ├── Arc<dyn ReplicationControlPlane>
//!   ├── Arc<dyn CatalogClient>
//!   ├── Arc<dyn SecretStore>
//!   ├── Arc<dyn ForeignDataManager>
//!   └── Arc<dyn StorageCredentials>
//! ```

pub mod catalog;
pub mod credentials;
pub mod error;
pub mod replication;
pub mod sandbox;
pub mod secrets;
pub mod wrappers;

use std::sync::Arc;

pub use catalog::CatalogClient;
pub use credentials::StorageCredentials;
pub use error::{PlatformError, PlatformResult};
pub use replication::ReplicationControlPlane;
pub use sandbox::{Operation, Sandbox};
pub use secrets::SecretStore;
pub use wrappers::ForeignDataManager;

/// Handles to every collaborator the orchestrator needs.
#[derive(Clone)]
pub struct Platform {
    pub replication: Arc<dyn ReplicationControlPlane>,
    pub catalog: Arc<dyn CatalogClient>,
    pub secrets: Arc<dyn SecretStore>,
    pub wrappers: Arc<dyn ForeignDataManager>,
    pub credentials: Arc<dyn StorageCredentials>,
}
