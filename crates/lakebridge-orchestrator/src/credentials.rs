//! Catalog credential resolution.
//!
//! The bucket's wrapper instance carries the catalog URI, warehouse, and
//! region as plain server options, and the S3 key pair plus catalog token as
//! secret-store references. All three secrets are decrypted in one batch.
//!
//! Replication into a bucket also needs an S3 access key described as
//! `{n}_keys`; [`ensure_bucket_access_key`] creates it once per bucket.

use std::fmt;

use tracing::{debug, info};

use lakebridge_core::naming::s3_access_key_name;
use lakebridge_core::types::wrapper_options;
use lakebridge_core::*;
use lakebridge_platform::{Platform, PlatformError, PlatformResult, StorageCredentials};

/// Plaintext credentials needed to create a namespace and a destination.
#[derive(Clone)]
pub struct CatalogCredentials {
    pub connection: CatalogConnection,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_region: String,
}

impl fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("connection", &self.connection)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field("s3_secret_access_key", &"<redacted>")
            .field("s3_region", &self.s3_region)
            .finish()
    }
}

/// Find the bucket's wrapper instance and resolve its credentials.
pub async fn resolve_catalog_credentials(
    platform: &Platform,
    project_ref: &str,
    bucket: &BucketId,
    default_region: &str,
) -> PlatformResult<CatalogCredentials> {
    let wrapper_name = lakebridge_core::naming::wrapper_name(bucket);
    let wrapper = platform
        .wrappers
        .list_wrappers(project_ref)
        .await?
        .into_iter()
        .find(|w| w.name == wrapper_name)
        .ok_or_else(|| PlatformError::not_found("wrapper", &wrapper_name))?;
    credentials_from_wrapper(platform, project_ref, bucket, &wrapper, default_region).await
}

/// Resolve credentials from an already-located wrapper instance.
pub async fn credentials_from_wrapper(
    platform: &Platform,
    project_ref: &str,
    bucket: &BucketId,
    wrapper: &WrapperInstance,
    default_region: &str,
) -> PlatformResult<CatalogCredentials> {
    let required = |key: &str| {
        wrapper.option(key).map(str::to_string).ok_or_else(|| {
            PlatformError::Rejected(format!("wrapper {} has no {key} option", wrapper.name))
        })
    };

    let catalog_uri = required(wrapper_options::CATALOG_URI)?;
    let access_key_ref = required(wrapper_options::VAULT_ACCESS_KEY_ID)?;
    let secret_key_ref = required(wrapper_options::VAULT_SECRET_ACCESS_KEY)?;
    let token_ref = required(wrapper_options::VAULT_CATALOG_TOKEN)?;

    let ids = vec![access_key_ref.clone(), secret_key_ref.clone(), token_ref.clone()];
    let mut decrypted = platform.secrets.decrypt(project_ref, &ids).await?;
    let mut take = |id: &str| {
        decrypted
            .remove(id)
            .ok_or_else(|| PlatformError::not_found("secret", id))
    };
    let s3_access_key_id = take(&access_key_ref)?;
    let s3_secret_access_key = take(&secret_key_ref)?;
    let token = take(&token_ref)?;

    let warehouse = wrapper
        .option(wrapper_options::WAREHOUSE)
        .unwrap_or(bucket.as_str())
        .to_string();
    let s3_region = wrapper
        .option(wrapper_options::REGION)
        .unwrap_or(default_region)
        .to_string();

    debug!(wrapper = %wrapper.name, %warehouse, region = %s3_region, "resolved catalog credentials");
    Ok(CatalogCredentials {
        connection: CatalogConnection {
            uri: catalog_uri,
            warehouse,
            token,
        },
        s3_access_key_id,
        s3_secret_access_key,
        s3_region,
    })
}

/// Return the bucket's S3 access key, creating it if none matches its
/// description.
pub async fn ensure_bucket_access_key(
    credentials: &dyn StorageCredentials,
    project_ref: &str,
    bucket: &BucketId,
) -> PlatformResult<S3AccessKey> {
    let description = s3_access_key_name(bucket);
    if let Some(key) = credentials
        .list_access_keys(project_ref)
        .await?
        .into_iter()
        .find(|k| k.description == description)
    {
        return Ok(key);
    }

    let key = credentials.create_access_key(project_ref, &description).await?;
    info!(bucket = %bucket, key_id = %key.id, "created s3 access key");
    Ok(key)
}
