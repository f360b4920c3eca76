//! Resource naming: every dependent resource of an analytics bucket is
//! identified by a name derived from the bucket id.
//!
//! The subsystems that own those resources share no schema, so these names
//! are the only join key between them. Derivation is pure and total over a
//! validated [`BucketId`]: the same id always yields the same names, and two
//! different ids never yield the same name within a resource class.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::SourceTable;

/// Storage naming rules for analytics buckets. Underscores and dots are
/// rejected so that `-` → `_` normalization stays injective.
static BUCKET_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").expect("static bucket id pattern")
});

const BUCKET_ID_MIN_LEN: usize = 3;
const BUCKET_ID_MAX_LEN: usize = 63;

/// A validated analytics bucket id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketId(String);

impl BucketId {
    /// Validate a raw bucket id.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw.is_empty() {
            return Err(CoreError::EmptyBucketId);
        }
        let invalid = |reason| CoreError::InvalidBucketId {
            id: raw.to_string(),
            reason,
        };
        if raw.len() < BUCKET_ID_MIN_LEN || raw.len() > BUCKET_ID_MAX_LEN {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !BUCKET_ID_RE.is_match(raw) {
            return Err(invalid(
                "only lowercase letters, digits and inner hyphens are allowed",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    /// The bucket id exactly as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical snake-case form used inside every derived name.
    pub fn normalized(&self) -> String {
        normalize_identifier(&self.0)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BucketId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BucketId> for String {
    fn from(id: BucketId) -> Self {
        id.0
    }
}

/// The full set of names owned by one analytics bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    pub bucket: BucketId,
    pub publication: String,
    pub destination: String,
    pub s3_access_key: String,
    pub wrapper: String,
    pub fdw_server: String,
    pub namespace: String,
    pub foreign_schema: String,
}

impl ResourceNames {
    pub fn derive(bucket: &BucketId) -> Self {
        let namespace = namespace_name(bucket);
        Self {
            bucket: bucket.clone(),
            publication: publication_name(bucket),
            destination: destination_name(bucket),
            s3_access_key: s3_access_key_name(bucket),
            wrapper: wrapper_name(bucket),
            fdw_server: fdw_server_name(bucket),
            foreign_schema: foreign_schema_name(&namespace),
            namespace,
        }
    }
}

pub fn publication_name(bucket: &BucketId) -> String {
    format!("analytics_{}_publication", bucket.normalized())
}

pub fn destination_name(bucket: &BucketId) -> String {
    format!("analytics_{}_destination", bucket.normalized())
}

pub fn s3_access_key_name(bucket: &BucketId) -> String {
    format!("{}_keys", bucket.normalized())
}

pub fn wrapper_name(bucket: &BucketId) -> String {
    format!("{}_fdw", bucket.normalized())
}

pub fn fdw_server_name(bucket: &BucketId) -> String {
    format!("{}_fdw_server", bucket.normalized())
}

pub fn namespace_name(bucket: &BucketId) -> String {
    format!("{}_namespace", bucket.normalized())
}

/// Postgres schema that foreign tables of a catalog namespace are imported into.
pub fn foreign_schema_name(namespace: &str) -> String {
    format!("fdw_analytics_{}", normalize_identifier(namespace))
}

/// Catalog table name the replicator creates for a source table.
///
/// One-way: `public.events` → `public_events_changelog`.
pub fn changelog_table_name(table: &SourceTable) -> String {
    normalize_identifier(&format!("{}_{}_changelog", table.schema, table.name))
}

/// Reverse the changelog transform by searching a candidate list.
pub fn find_source_table<'a, I>(catalog_table: &str, candidates: I) -> Option<&'a SourceTable>
where
    I: IntoIterator<Item = &'a SourceTable>,
{
    candidates
        .into_iter()
        .find(|table| changelog_table_name(table) == catalog_table)
}

/// Lowercase, with every character outside `[a-z0-9]` mapped to `_`.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}
