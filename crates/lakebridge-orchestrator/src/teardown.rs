//! Teardown orchestrator: best-effort deletion of everything a bucket owned.
//!
//! Runs after the bucket itself is gone, so there is no retry path: every
//! deletion is attempted independently and concurrently, failures are
//! logged, and the caller gets a [`TeardownReport`] instead of an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

use lakebridge_core::BucketId;
use lakebridge_platform::{Platform, PlatformError, PlatformResult};

use crate::resolver::{AssociatedEntities, ResourceKind, resolve};

/// The four resource groups teardown removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownResource {
    ForeignDataWrapper,
    S3AccessKey,
    PipelineAndDestination,
    Publication,
}

impl fmt::Display for TeardownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TeardownResource::ForeignDataWrapper => "foreign data wrapper",
            TeardownResource::S3AccessKey => "s3 access key",
            TeardownResource::PipelineAndDestination => "pipeline and destination",
            TeardownResource::Publication => "publication",
        })
    }
}

/// What happened to one resource group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum TeardownOutcome {
    Deleted,
    /// Nothing to delete: never created, or already removed.
    Skipped,
    /// Deletion (or the lookup preceding it) failed; the resource may remain.
    Failed(String),
}

/// Per-resource outcome of a teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub bucket: BucketId,
    pub outcomes: BTreeMap<TeardownResource, TeardownOutcome>,
}

impl TeardownReport {
    /// Resources that may still exist.
    pub fn pending(&self) -> Vec<TeardownResource> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TeardownOutcome::Failed(_)))
            .map(|(resource, _)| *resource)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn outcome(&self, resource: TeardownResource) -> Option<&TeardownOutcome> {
        self.outcomes.get(&resource)
    }
}

/// Delete every dependent resource of `bucket`. Never fails.
pub async fn teardown(platform: &Platform, project_ref: &str, bucket: &BucketId) -> TeardownReport {
    let entities = resolve(platform, project_ref, bucket).await;

    let (wrapper, key, pipeline, publication) = tokio::join!(
        delete_wrapper(platform, project_ref, &entities),
        delete_access_key(platform, project_ref, &entities),
        delete_pipeline(platform, project_ref, &entities),
        delete_publication(platform, project_ref, &entities),
    );

    let outcomes = BTreeMap::from([
        (TeardownResource::ForeignDataWrapper, wrapper),
        (TeardownResource::S3AccessKey, key),
        (TeardownResource::PipelineAndDestination, pipeline),
        (TeardownResource::Publication, publication),
    ]);
    let report = TeardownReport {
        bucket: bucket.clone(),
        outcomes,
    };

    for (resource, outcome) in &report.outcomes {
        match outcome {
            TeardownOutcome::Deleted => info!(bucket = %bucket, %resource, "deleted"),
            TeardownOutcome::Skipped => warn!(bucket = %bucket, %resource, "not found, skipped"),
            TeardownOutcome::Failed(e) => error!(bucket = %bucket, %resource, error = %e, "deletion failed"),
        }
    }
    let pending = report.pending();
    if pending.is_empty() {
        info!(bucket = %bucket, "teardown complete");
    } else {
        warn!(bucket = %bucket, ?pending, "teardown left resources behind");
    }
    report
}

/// Map an absent member to `Skipped`, or `Failed` when its lookup failed.
fn absent(entities: &AssociatedEntities, kind: ResourceKind) -> TeardownOutcome {
    match entities.failure(kind) {
        Some(failure) => TeardownOutcome::Failed(format!("lookup failed: {}", failure.error)),
        None => TeardownOutcome::Skipped,
    }
}

fn settle(result: PlatformResult<()>) -> TeardownOutcome {
    match result {
        Ok(()) => TeardownOutcome::Deleted,
        // Gone between lookup and delete.
        Err(PlatformError::NotFound { .. }) => TeardownOutcome::Skipped,
        Err(e) => TeardownOutcome::Failed(e.to_string()),
    }
}

async fn delete_wrapper(platform: &Platform, project_ref: &str, entities: &AssociatedEntities) -> TeardownOutcome {
    match &entities.wrapper {
        Some(wrapper) => settle(platform.wrappers.delete_wrapper(project_ref, wrapper.id).await),
        None => absent(entities, ResourceKind::Wrapper),
    }
}

async fn delete_access_key(platform: &Platform, project_ref: &str, entities: &AssociatedEntities) -> TeardownOutcome {
    match &entities.s3_access_key {
        Some(key) => settle(platform.credentials.delete_access_key(project_ref, &key.id).await),
        None => absent(entities, ResourceKind::S3AccessKey),
    }
}

async fn delete_pipeline(platform: &Platform, project_ref: &str, entities: &AssociatedEntities) -> TeardownOutcome {
    match (&entities.pipeline, &entities.destination) {
        (Some(pipeline), _) => settle(
            platform
                .replication
                .delete_destination_pipeline(project_ref, pipeline.destination_id, pipeline.id)
                .await,
        ),
        (None, Some(destination)) => match entities.failure(ResourceKind::Pipeline) {
            Some(failure) => TeardownOutcome::Failed(format!("lookup failed: {}", failure.error)),
            None => TeardownOutcome::Failed(format!(
                "destination {} has no pipeline to delete with",
                destination.name
            )),
        },
        (None, None) => match absent(entities, ResourceKind::Destination) {
            TeardownOutcome::Skipped => absent(entities, ResourceKind::Pipeline),
            failed => failed,
        },
    }
}

async fn delete_publication(platform: &Platform, project_ref: &str, entities: &AssociatedEntities) -> TeardownOutcome {
    match &entities.publication {
        Some(publication) => settle(
            platform
                .replication
                .delete_publication(project_ref, publication.source_id, &publication.name)
                .await,
        ),
        None => match absent(entities, ResourceKind::Source) {
            TeardownOutcome::Skipped => absent(entities, ResourceKind::Publication),
            failed => failed,
        },
    }
}

#[cfg(test)]
mod tests {
    use lakebridge_platform::{Operation, Sandbox};

    use super::*;

    #[tokio::test]
    async fn nothing_to_delete_is_all_skipped() {
        let sandbox = Sandbox::new();
        let bucket = BucketId::parse("lake").unwrap();
        let report = teardown(&sandbox.platform(), "proj", &bucket).await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(report.outcomes.values().all(|o| *o == TeardownOutcome::Skipped));
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn failed_lookup_is_reported_as_failed() {
        let sandbox = Sandbox::new();
        let bucket = BucketId::parse("lake").unwrap();
        sandbox.seed_analytics_bucket(&bucket, "https://catalog").await;
        sandbox.fail_once(Operation::ListAccessKeys).await;

        let report = teardown(&sandbox.platform(), "proj", &bucket).await;
        assert!(matches!(
            report.outcome(TeardownResource::S3AccessKey),
            Some(TeardownOutcome::Failed(_))
        ));
        assert_eq!(
            report.outcome(TeardownResource::ForeignDataWrapper),
            Some(&TeardownOutcome::Deleted)
        );
        assert_eq!(report.pending(), vec![TeardownResource::S3AccessKey]);
    }

    #[test]
    fn report_serializes_outcomes() {
        let report = TeardownReport {
            bucket: BucketId::parse("lake").unwrap(),
            outcomes: BTreeMap::from([
                (TeardownResource::Publication, TeardownOutcome::Deleted),
                (TeardownResource::S3AccessKey, TeardownOutcome::Failed("boom".into())),
            ]),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"]["publication"]["outcome"], "deleted");
        assert_eq!(json["outcomes"]["s3_access_key"]["error"], "boom");
    }
}
