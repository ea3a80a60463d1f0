//! nimbus.toml configuration parser.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [state]
//! path = "/var/lib/nimbus/model.redb"
//!
//! [jobs]
//! model_validation = true
//! delete_failed_instances = false
//!
//! [lifecycle]
//! port = 33033
//! connect_timeout = "0"      # 0 disables the timeout
//! request_timeout = "30s"    # per request, except deployment polls
//! deployment_timeout = "10m"
//! poll_interval = "2s"
//! default_container = "docker"
//!
//! [sync]
//! problem_queue_capacity = 1024
//! hardware_interval = "60s"
//! image_interval = "120s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NimbusConfig {
    pub state: StateConfig,
    pub jobs: JobsConfig,
    pub lifecycle: LifecycleConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// redb database file holding the model.
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/nimbus/model.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Validate the application graph before any remote call.
    pub model_validation: bool,
    /// Undeploy the component instance when a job fails after deploying it.
    pub delete_failed_instances: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            model_validation: true,
            delete_failed_instances: false,
        }
    }
}

/// Container flavour used for lifecycle components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerPreference {
    #[default]
    Docker,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Port the lifecycle agent listens on at every virtual machine.
    pub port: u16,
    pub connect_timeout: String,
    /// Longest wait for one agent answer.
    pub request_timeout: String,
    pub deployment_timeout: String,
    pub poll_interval: String,
    pub default_container: ContainerPreference,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            port: 33033,
            connect_timeout: "0".to_string(),
            request_timeout: "30s".to_string(),
            deployment_timeout: "10m".to_string(),
            poll_interval: "2s".to_string(),
            default_container: ContainerPreference::Docker,
        }
    }
}

impl LifecycleConfig {
    /// Connection timeout, `None` when configured as zero.
    pub fn connect_timeout(&self) -> Option<Duration> {
        parse_duration(&self.connect_timeout).filter(|d| !d.is_zero())
    }

    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout)
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(30))
    }

    pub fn deployment_timeout(&self) -> Duration {
        parse_duration(&self.deployment_timeout).unwrap_or(Duration::from_secs(600))
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.poll_interval)
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(2))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub problem_queue_capacity: usize,
    pub hardware_interval: String,
    pub image_interval: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            problem_queue_capacity: 1024,
            hardware_interval: "60s".to_string(),
            image_interval: "120s".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn hardware_interval(&self) -> Duration {
        parse_duration(&self.hardware_interval).unwrap_or(Duration::from_secs(60))
    }

    pub fn image_interval(&self) -> Duration {
        parse_duration(&self.image_interval).unwrap_or(Duration::from_secs(120))
    }
}

impl NimbusConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: NimbusConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject unparsable durations and a zero-capacity problem queue.
    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("lifecycle.connect_timeout", &self.lifecycle.connect_timeout),
            ("lifecycle.request_timeout", &self.lifecycle.request_timeout),
            ("lifecycle.deployment_timeout", &self.lifecycle.deployment_timeout),
            ("lifecycle.poll_interval", &self.lifecycle.poll_interval),
            ("sync.hardware_interval", &self.sync.hardware_interval),
            ("sync.image_interval", &self.sync.image_interval),
        ];
        for (key, value) in durations {
            if parse_duration(value).is_none() {
                bail!("{key}: invalid duration {value:?}");
            }
        }
        if self.sync.problem_queue_capacity == 0 {
            bail!("sync.problem_queue_capacity must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = NimbusConfig::from_toml("").unwrap();
        assert_eq!(config, NimbusConfig::default());
        assert!(config.jobs.model_validation);
        assert!(!config.jobs.delete_failed_instances);
        assert_eq!(config.lifecycle.connect_timeout(), None);
        assert_eq!(config.lifecycle.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.lifecycle.default_container, ContainerPreference::Docker);
    }

    #[test]
    fn parse_partial_sections() {
        let toml_str = r#"
[jobs]
delete_failed_instances = true

[lifecycle]
connect_timeout = "3s"
default_container = "plain"

[sync]
hardware_interval = "15s"
"#;
        let config = NimbusConfig::from_toml(toml_str).unwrap();
        assert!(config.jobs.model_validation);
        assert!(config.jobs.delete_failed_instances);
        assert_eq!(config.lifecycle.connect_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.lifecycle.default_container, ContainerPreference::Plain);
        assert_eq!(config.lifecycle.port, 33033);
        assert_eq!(config.sync.hardware_interval(), Duration::from_secs(15));
        assert_eq!(config.sync.image_interval(), Duration::from_secs(120));
    }

    #[test]
    fn invalid_duration_rejected() {
        let err = NimbusConfig::from_toml("[sync]\nimage_interval = \"often\"\n").unwrap_err();
        assert!(err.to_string().contains("sync.image_interval"));
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        assert!(NimbusConfig::from_toml("[sync]\nproblem_queue_capacity = 0\n").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = NimbusConfig::default();
        config.lifecycle.port = 4000;
        let text = config.to_toml_string().unwrap();
        assert_eq!(NimbusConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nimbus.toml");
        std::fs::write(&path, "[jobs]\nmodel_validation = false\n").unwrap();

        let config = NimbusConfig::from_file(&path).unwrap();
        assert!(!config.jobs.model_validation);

        let missing = NimbusConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(missing.to_string().contains("absent.toml"));
    }
}
