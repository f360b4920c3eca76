//! lakebridge.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LakebridgeConfig {
    pub project: ProjectConfig,
    pub catalog: CatalogConfig,
    pub reconciliation: ReconciliationConfig,
    pub pipeline: PipelineConfig,
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    #[serde(rename = "ref")]
    pub project_ref: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_ref: "local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Region used when the wrapper instance does not carry one.
    pub default_region: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub poll_interval_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4000,
        }
    }
}

impl ReconciliationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub status_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            status_poll_interval_ms: 4000,
        }
    }
}

impl PipelineConfig {
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub rollback: RollbackPolicy,
}

/// What the provisioner does with already-created resources when a later
/// step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
    /// Surface the error and leave partial resources in place.
    #[default]
    LeaveInPlace,
    /// Delete completed resources in reverse creation order, best-effort.
    ReverseOrder,
}

impl LakebridgeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LakebridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_file() {
        let config: LakebridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.reconciliation.poll_interval(), Duration::from_secs(4));
        assert_eq!(config.pipeline.status_poll_interval(), Duration::from_secs(4));
        assert_eq!(config.provisioning.rollback, RollbackPolicy::LeaveInPlace);
        assert_eq!(config.project.project_ref, "local");
    }

    #[test]
    fn parse_full_file() {
        let toml_str = r#"
[project]
ref = "abcdefghijklmnop"

[catalog]
default_region = "eu-west-2"

[reconciliation]
poll_interval_ms = 1500

[provisioning]
rollback = "reverse_order"
"#;
        let config: LakebridgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.project_ref, "abcdefghijklmnop");
        assert_eq!(config.catalog.default_region, "eu-west-2");
        assert_eq!(config.reconciliation.poll_interval_ms, 1500);
        assert_eq!(config.pipeline.status_poll_interval_ms, 4000);
        assert_eq!(config.provisioning.rollback, RollbackPolicy::ReverseOrder);
    }

    #[test]
    fn from_file_round_trips_written_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lakebridge.toml");
        let mut config = LakebridgeConfig::default();
        config.reconciliation.poll_interval_ms = 250;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = LakebridgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.reconciliation.poll_interval_ms, 250);
    }

    #[test]
    fn from_file_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LakebridgeConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }
}
