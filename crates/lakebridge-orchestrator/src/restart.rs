//! Pipeline restart: stop, then start.
//!
//! A bare start on a running deployment does not replace workers stuck in a
//! crash loop, so a restart always stops first and waits for the stop to be
//! accepted before requesting the start.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use lakebridge_core::PipelineId;
use lakebridge_platform::ReplicationControlPlane;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Which half of a restart failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPhase {
    Stop,
    Start,
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPhase::Stop => f.write_str("stop"),
            RestartPhase::Start => f.write_str("start"),
        }
    }
}

/// Restart a pipeline. If the stop fails the start is never attempted.
pub async fn restart_pipeline(
    replication: &dyn ReplicationControlPlane,
    project_ref: &str,
    pipeline_id: PipelineId,
) -> OrchestratorResult<()> {
    replication
        .stop_pipeline(project_ref, pipeline_id)
        .await
        .map_err(|source| {
            warn!(pipeline_id, error = %source, "pipeline stop failed, start not attempted");
            OrchestratorError::Restart {
                phase: RestartPhase::Stop,
                pipeline_id,
                source,
            }
        })?;

    replication
        .start_pipeline(project_ref, pipeline_id)
        .await
        .map_err(|source| {
            warn!(pipeline_id, error = %source, "pipeline start failed after stop");
            OrchestratorError::Restart {
                phase: RestartPhase::Start,
                pipeline_id,
                source,
            }
        })?;

    info!(pipeline_id, "pipeline restarted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use lakebridge_core::*;
    use lakebridge_platform::{Operation, Sandbox};

    use super::*;

    async fn sandbox_with_pipeline() -> (Sandbox, PipelineId) {
        let sandbox = Sandbox::new();
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
        sandbox.clear_calls().await;
        (sandbox, created.pipeline_id)
    }

    #[tokio::test]
    async fn stops_before_starting() {
        let (sandbox, pipeline_id) = sandbox_with_pipeline().await;
        restart_pipeline(&sandbox, "proj", pipeline_id).await.unwrap();
        assert_eq!(
            sandbox.calls().await,
            vec![Operation::StopPipeline, Operation::StartPipeline]
        );
    }

    #[tokio::test]
    async fn stop_failure_never_starts() {
        let (sandbox, pipeline_id) = sandbox_with_pipeline().await;
        sandbox.fail_once(Operation::StopPipeline).await;

        let err = restart_pipeline(&sandbox, "proj", pipeline_id).await.unwrap_err();
        assert_eq!(err.restart_phase(), Some(RestartPhase::Stop));
        assert!(!sandbox.calls().await.contains(&Operation::StartPipeline));
    }

    #[tokio::test]
    async fn start_failure_is_tagged_start() {
        let (sandbox, pipeline_id) = sandbox_with_pipeline().await;
        sandbox.fail_once(Operation::StartPipeline).await;

        let err = restart_pipeline(&sandbox, "proj", pipeline_id).await.unwrap_err();
        assert_eq!(err.restart_phase(), Some(RestartPhase::Start));
        assert!(err.to_string().contains("start phase"));
    }
}
