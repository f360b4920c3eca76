//! Foreign-data wrapper management.

use async_trait::async_trait;

use lakebridge_core::{WrapperId, WrapperInstance};

use crate::error::PlatformResult;

#[async_trait]
pub trait ForeignDataManager: Send + Sync {
    async fn list_wrappers(&self, project_ref: &str) -> PlatformResult<Vec<WrapperInstance>>;

    /// Replace a wrapper instance's options and table list.
    async fn update_wrapper(
        &self,
        project_ref: &str,
        wrapper: &WrapperInstance,
    ) -> PlatformResult<()>;

    /// Drop the wrapper instance, its server, and its foreign tables.
    async fn delete_wrapper(&self, project_ref: &str, wrapper_id: WrapperId)
        -> PlatformResult<()>;

    /// `IMPORT FOREIGN SCHEMA source_schema FROM SERVER server_name INTO target_schema`.
    async fn import_foreign_schema(
        &self,
        project_ref: &str,
        server_name: &str,
        source_schema: &str,
        target_schema: &str,
    ) -> PlatformResult<()>;

    async fn drop_foreign_table(
        &self,
        project_ref: &str,
        schema: &str,
        table: &str,
    ) -> PlatformResult<()>;
}
