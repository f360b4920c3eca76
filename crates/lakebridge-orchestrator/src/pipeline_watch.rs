//! Pipeline status watch: poll a pipeline until it reports started.
//!
//! Starting is asynchronous: the provisioner and restarts only request it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use lakebridge_core::{PipelineId, PipelineStatus};
use lakebridge_platform::ReplicationControlPlane;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Polls one project's pipelines at a fixed interval.
pub struct PipelineWatch {
    replication: Arc<dyn ReplicationControlPlane>,
    project_ref: String,
    interval: Duration,
}

impl PipelineWatch {
    /// Watch pipelines of `project_ref`, polling every `interval`.
    pub fn new(
        replication: Arc<dyn ReplicationControlPlane>,
        project_ref: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            replication,
            project_ref: project_ref.into(),
            interval,
        }
    }

    /// Poll until the pipeline is started. A `failed` status ends the watch
    /// with an error, as does `stopped` on any poll after the first (a start
    /// request may not be visible yet on the first). Fetch errors are logged
    /// and polled through. Wrap in `tokio::time::timeout` to bound the wait.
    pub async fn wait_until_started(&self, pipeline_id: PipelineId) -> OrchestratorResult<u64> {
        let mut polls = 0u64;
        loop {
            polls += 1;
            match self.replication.pipeline_status(&self.project_ref, pipeline_id).await {
                Ok(PipelineStatus::Started) => {
                    info!(pipeline_id, polls, "pipeline started");
                    return Ok(polls);
                }
                Ok(PipelineStatus::Failed) => {
                    return Err(OrchestratorError::PipelineFailed(pipeline_id));
                }
                Ok(PipelineStatus::Stopped) if polls > 1 => {
                    return Err(OrchestratorError::PipelineStopped(pipeline_id));
                }
                Ok(status) => debug!(pipeline_id, %status, "waiting for pipeline"),
                Err(e) => warn!(pipeline_id, error = %e, "pipeline status fetch failed"),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use lakebridge_core::*;
    use lakebridge_platform::{Operation, Sandbox};

    use super::*;

    async fn created_pipeline(sandbox: &Sandbox) -> PipelineId {
        let source_id = sandbox.seed_source("proj", []).await;
        let created = sandbox
            .create_destination_pipeline(
                "proj",
                &DestinationPipelineRequest {
                    destination_name: "analytics_lake_destination".into(),
                    destination_config: DestinationConfig::Iceberg(IcebergDestinationConfig {
                        project_ref: "proj".into(),
                        warehouse_name: "lake".into(),
                        namespace: "lake_namespace".into(),
                        catalog_uri: "https://catalog".into(),
                        catalog_token: "t".into(),
                        s3_access_key_id: "id".into(),
                        s3_secret_access_key: "s".into(),
                        s3_region: "us-east-1".into(),
                    }),
                    source_id,
                    publication_name: "analytics_lake_publication".into(),
                },
            )
            .await
            .unwrap();
        created.pipeline_id
    }

    async fn started_pipeline(sandbox: &Sandbox) -> PipelineId {
        let pipeline_id = created_pipeline(sandbox).await;
        sandbox.start_pipeline("proj", pipeline_id).await.unwrap();
        pipeline_id
    }

    #[tokio::test(start_paused = true)]
    async fn waits_through_starting_and_fetch_errors() {
        let sandbox = Sandbox::new().with_startup_polls(3);
        let pipeline_id = started_pipeline(&sandbox).await;
        sandbox.fail_once(Operation::PipelineStatus).await;

        let watch = PipelineWatch::new(Arc::new(sandbox.clone()), "proj", Duration::from_secs(4));
        // One failed fetch, then three polls to leave `starting`.
        assert_eq!(watch.wait_until_started(pipeline_id).await.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_ends_the_watch() {
        let sandbox = Sandbox::new();
        let pipeline_id = started_pipeline(&sandbox).await;
        sandbox.set_pipeline_status(pipeline_id, PipelineStatus::Failed).await;

        let watch = PipelineWatch::new(Arc::new(sandbox.clone()), "proj", Duration::from_secs(4));
        let err = watch.wait_until_started(pipeline_id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PipelineFailed(id) if id == pipeline_id));
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_left_stopped_ends_the_watch() {
        let sandbox = Sandbox::new();
        let pipeline_id = created_pipeline(&sandbox).await;

        let watch = PipelineWatch::new(Arc::new(sandbox.clone()), "proj", Duration::from_secs(4));
        let err = watch.wait_until_started(pipeline_id).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PipelineStopped(id) if id == pipeline_id));
        let polls = sandbox.calls().await.into_iter().filter(|op| *op == Operation::PipelineStatus).count();
        assert_eq!(polls, 2);
    }
}
