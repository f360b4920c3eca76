//! Associated-entities resolver: discover every dependent resource of a
//! bucket by matching derived names against each subsystem's listing.
//!
//! Read-only. Every member of [`AssociatedEntities`] is independently
//! optional: a resource may not exist yet, may already be gone, or its
//! lookup may have failed. Failed lookups are recorded, never propagated.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use lakebridge_core::*;
use lakebridge_platform::{Platform, PlatformError, PlatformResult};

/// Resource classes the resolver looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wrapper,
    S3AccessKey,
    Source,
    Publication,
    Destination,
    Pipeline,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Wrapper => "wrapper",
            ResourceKind::S3AccessKey => "s3 access key",
            ResourceKind::Source => "replication source",
            ResourceKind::Publication => "publication",
            ResourceKind::Destination => "destination",
            ResourceKind::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing call that failed during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub kind: ResourceKind,
    pub error: PlatformError,
}

/// Best-effort join of everything a bucket owns.
#[derive(Debug, Clone, Default)]
pub struct AssociatedEntities {
    pub wrapper: Option<WrapperInstance>,
    pub s3_access_key: Option<S3AccessKey>,
    pub source_id: Option<SourceId>,
    pub publication: Option<Publication>,
    pub destination: Option<Destination>,
    pub pipeline: Option<Pipeline>,
    pub failures: Vec<LookupFailure>,
}

impl AssociatedEntities {
    pub fn failure(&self, kind: ResourceKind) -> Option<&LookupFailure> {
        self.failures.iter().find(|f| f.kind == kind)
    }

    /// Whether nothing at all was found.
    pub fn is_empty(&self) -> bool {
        self.wrapper.is_none()
            && self.s3_access_key.is_none()
            && self.source_id.is_none()
            && self.publication.is_none()
            && self.destination.is_none()
            && self.pipeline.is_none()
    }
}

/// Resolve the dependent resources of `bucket` in `project_ref`.
///
/// Independent chains run concurrently:
///
/// ```text
/// wrappers ─────────────────────────▶ wrapper
/// access keys ──────────────────────▶ s3_access_key
/// sources ──▶ publications(source) ─▶ source_id, publication
/// destinations + pipelines ─────────▶ destination, pipeline
/// ```
pub async fn resolve(platform: &Platform, project_ref: &str, bucket: &BucketId) -> AssociatedEntities {
    let names = ResourceNames::derive(bucket);

    let (wrappers, keys, source_chain, destinations, pipelines) = tokio::join!(
        platform.wrappers.list_wrappers(project_ref),
        platform.credentials.list_access_keys(project_ref),
        resolve_source_chain(platform, project_ref, &names),
        platform.replication.list_destinations(project_ref),
        platform.replication.list_pipelines(project_ref),
    );

    let mut failures = Vec::new();

    let wrapper = settle(ResourceKind::Wrapper, wrappers, &mut failures)
        .and_then(|ws| ws.into_iter().find(|w| w.name == names.wrapper));

    let s3_access_key = settle(ResourceKind::S3AccessKey, keys, &mut failures)
        .and_then(|ks| ks.into_iter().find(|k| k.description == names.s3_access_key));

    let (source_id, publication) = match source_chain {
        SourceChain::Resolved {
            source_id,
            publications,
        } => {
            let publication = settle(ResourceKind::Publication, publications, &mut failures)
                .and_then(|ps| ps.into_iter().find(|p| p.name == names.publication));
            (Some(source_id), publication)
        }
        SourceChain::Missing => (None, None),
        SourceChain::Failed(error) => {
            settle::<()>(ResourceKind::Source, Err(error), &mut failures);
            (None, None)
        }
    };

    let destination = settle(ResourceKind::Destination, destinations, &mut failures)
        .and_then(|ds| ds.into_iter().find(|d| d.name == names.destination));

    let pipeline = settle(ResourceKind::Pipeline, pipelines, &mut failures).and_then(|ps| {
        ps.into_iter().find(|p| match &destination {
            Some(d) => p.destination_id == d.id,
            None => p.publication_name == names.publication,
        })
    });

    let entities = AssociatedEntities {
        wrapper,
        s3_access_key,
        source_id,
        publication,
        destination,
        pipeline,
        failures,
    };
    debug!(
        bucket = %bucket,
        wrapper = entities.wrapper.is_some(),
        s3_access_key = entities.s3_access_key.is_some(),
        source = entities.source_id.is_some(),
        publication = entities.publication.is_some(),
        destination = entities.destination.is_some(),
        pipeline = entities.pipeline.is_some(),
        failures = entities.failures.len(),
        "resolved associated entities"
    );
    entities
}

enum SourceChain {
    Resolved {
        source_id: SourceId,
        publications: PlatformResult<Vec<Publication>>,
    },
    Missing,
    Failed(PlatformError),
}

async fn resolve_source_chain(
    platform: &Platform,
    project_ref: &str,
    names: &ResourceNames,
) -> SourceChain {
    let sources = match platform.replication.list_sources(project_ref).await {
        Ok(sources) => sources,
        Err(e) => return SourceChain::Failed(e),
    };
    let Some(source) = sources.into_iter().find(|s| s.name == project_ref) else {
        debug!(publication = %names.publication, "no replication source, skipping publication lookup");
        return SourceChain::Missing;
    };
    let publications = platform
        .replication
        .list_publications(project_ref, source.id)
        .await;
    SourceChain::Resolved {
        source_id: source.id,
        publications,
    }
}

fn settle<T>(
    kind: ResourceKind,
    result: PlatformResult<T>,
    failures: &mut Vec<LookupFailure>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%kind, %error, "lookup failed, treating as absent");
            failures.push(LookupFailure { kind, error });
            None
        }
    }
}
