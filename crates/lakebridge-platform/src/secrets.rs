//! Secret store: batch decryption by secret id.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::PlatformResult;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Decrypt a batch of secrets. Ids the store does not know are absent
    /// from the returned map.
    async fn decrypt(
        &self,
        project_ref: &str,
        ids: &[String],
    ) -> PlatformResult<HashMap<String, String>>;
}
