//! lakebridge-core: shared types for the analytics-bucket connection
//! orchestrator.
//!
//! - **`naming`**: deterministic resource names derived from a bucket id,
//!   and the source-table ↔ catalog-table changelog transform
//! - **`types`**: publications, pipelines, destinations, wrapper instances
//! - **`config`**: `lakebridge.toml` parsing

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::LakebridgeConfig;
pub use error::{CoreError, CoreResult};
pub use naming::{BucketId, ResourceNames};
pub use types::*;
