//! Replication control plane: publications, destinations, and pipelines.

use std::collections::BTreeSet;

use async_trait::async_trait;

use lakebridge_core::{
    CreatedPipeline, Destination, DestinationId, DestinationPipelineRequest, Pipeline,
    PipelineId, PipelineStatus, Publication, ReplicationSource, SourceId, SourceTable,
};

use crate::error::PlatformResult;

/// Client for the project's replication control plane.
#[async_trait]
pub trait ReplicationControlPlane: Send + Sync {
    async fn list_sources(&self, project_ref: &str) -> PlatformResult<Vec<ReplicationSource>>;

    /// Create the project's replication source ("enable replication").
    async fn create_tenant_source(&self, project_ref: &str) -> PlatformResult<SourceId>;

    /// Every table of the source database that can be replicated.
    async fn list_tables(
        &self,
        project_ref: &str,
        source_id: SourceId,
    ) -> PlatformResult<Vec<SourceTable>>;

    async fn list_publications(
        &self,
        project_ref: &str,
        source_id: SourceId,
    ) -> PlatformResult<Vec<Publication>>;

    async fn create_publication(
        &self,
        project_ref: &str,
        source_id: SourceId,
        name: &str,
        tables: &BTreeSet<SourceTable>,
    ) -> PlatformResult<()>;

    /// Replace the publication's table list.
    async fn update_publication(
        &self,
        project_ref: &str,
        source_id: SourceId,
        name: &str,
        tables: &BTreeSet<SourceTable>,
    ) -> PlatformResult<()>;

    async fn delete_publication(
        &self,
        project_ref: &str,
        source_id: SourceId,
        name: &str,
    ) -> PlatformResult<()>;

    async fn list_destinations(&self, project_ref: &str) -> PlatformResult<Vec<Destination>>;

    async fn list_pipelines(&self, project_ref: &str) -> PlatformResult<Vec<Pipeline>>;

    async fn create_destination_pipeline(
        &self,
        project_ref: &str,
        request: &DestinationPipelineRequest,
    ) -> PlatformResult<CreatedPipeline>;

    async fn delete_destination_pipeline(
        &self,
        project_ref: &str,
        destination_id: DestinationId,
        pipeline_id: PipelineId,
    ) -> PlatformResult<()>;

    /// Request a start. Returns once the request is accepted, not once
    /// the pipeline is running.
    async fn start_pipeline(&self, project_ref: &str, pipeline_id: PipelineId)
        -> PlatformResult<()>;

    async fn stop_pipeline(&self, project_ref: &str, pipeline_id: PipelineId)
        -> PlatformResult<()>;

    async fn pipeline_status(
        &self,
        project_ref: &str,
        pipeline_id: PipelineId,
    ) -> PlatformResult<PipelineStatus>;
}
