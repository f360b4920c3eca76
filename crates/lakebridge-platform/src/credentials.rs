//! Storage credentials: S3 access keys scoped to a bucket.

use async_trait::async_trait;

use lakebridge_core::S3AccessKey;

use crate::error::PlatformResult;

#[async_trait]
pub trait StorageCredentials: Send + Sync {
    async fn list_access_keys(&self, project_ref: &str) -> PlatformResult<Vec<S3AccessKey>>;

    async fn create_access_key(
        &self,
        project_ref: &str,
        description: &str,
    ) -> PlatformResult<S3AccessKey>;

    async fn delete_access_key(&self, project_ref: &str, key_id: &str) -> PlatformResult<()>;
}
