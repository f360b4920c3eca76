//! Replication enablement: a project needs a replication source before any
//! bucket can be connected.

use tracing::info;

use lakebridge_core::SourceId;
use lakebridge_platform::ReplicationControlPlane;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Return the project's replication source, creating it if missing.
pub async fn ensure_replication_source(
    replication: &dyn ReplicationControlPlane,
    project_ref: &str,
) -> OrchestratorResult<SourceId> {
    let sources = replication
        .list_sources(project_ref)
        .await
        .map_err(OrchestratorError::platform("list replication sources"))?;
    if let Some(source) = sources.into_iter().find(|s| s.name == project_ref) {
        return Ok(source.id);
    }

    let source_id = replication
        .create_tenant_source(project_ref)
        .await
        .map_err(OrchestratorError::platform("create replication source"))?;
    info!(%project_ref, source_id, "replication enabled");
    Ok(source_id)
}
