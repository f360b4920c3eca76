//! Iceberg catalog client: namespaces and the tables inside them.

use async_trait::async_trait;

use lakebridge_core::CatalogConnection;

use crate::error::PlatformResult;

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn create_namespace(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<()>;

    async fn list_namespaces(&self, connection: &CatalogConnection) -> PlatformResult<Vec<String>>;

    async fn drop_namespace(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<()>;

    async fn list_tables(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
    ) -> PlatformResult<Vec<String>>;

    async fn drop_table(
        &self,
        connection: &CatalogConnection,
        namespace: &str,
        table: &str,
    ) -> PlatformResult<()>;
}
