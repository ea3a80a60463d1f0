//! Provider listings consumed by the watchdogs.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// How a provider identifies a listed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum ProviderId {
    /// A `credential/cloud/location/base_id` id. May be malformed.
    Scoped(String),
    /// A provider-native id that is not tied to a credential or location.
    Native(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareFlavor {
    pub id: ProviderId,
    pub name: String,
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub ram_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderImage {
    pub id: ProviderId,
    pub name: String,
    #[serde(default)]
    pub operating_system: Option<String>,
}

/// Read-only access to a provider's resource listings.
pub trait ComputeService: Send + Sync {
    fn list_hardware_flavors(&self) -> impl Future<Output = SyncResult<Vec<HardwareFlavor>>> + Send;

    fn list_images(&self) -> impl Future<Output = SyncResult<Vec<ProviderImage>>> + Send;
}

/// A provider listing exported to JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSnapshot {
    pub hardware_flavors: Vec<HardwareFlavor>,
    pub images: Vec<ProviderImage>,
}

/// Serves listings from a JSON file, re-read on every call so an external
/// exporter can refresh it between cycles.
#[derive(Debug, Clone)]
pub struct SnapshotComputeService {
    path: PathBuf,
}

impl SnapshotComputeService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> SyncResult<ProviderSnapshot> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SyncError::Provider(format!("reading {}: {e}", self.path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Provider(format!("parsing {}: {e}", self.path.display())))
    }
}

impl ComputeService for SnapshotComputeService {
    async fn list_hardware_flavors(&self) -> SyncResult<Vec<HardwareFlavor>> {
        Ok(self.load().await?.hardware_flavors)
    }

    async fn list_images(&self) -> SyncResult<Vec<ProviderImage>> {
        Ok(self.load().await?.images)
    }
}
