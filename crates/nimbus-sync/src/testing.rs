//! In-memory compute service for watchdog tests.

use crate::compute::{ComputeService, HardwareFlavor, ProviderImage};
use crate::error::{SyncError, SyncResult};

#[derive(Default)]
pub struct StaticCompute {
    hardware: Vec<HardwareFlavor>,
    images: Vec<ProviderImage>,
    failing: bool,
}

impl StaticCompute {
    pub fn hardware(hardware: Vec<HardwareFlavor>) -> Self {
        Self {
            hardware,
            ..Default::default()
        }
    }

    pub fn images(images: Vec<ProviderImage>) -> Self {
        Self {
            images,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    fn check(&self) -> SyncResult<()> {
        if self.failing {
            Err(SyncError::Provider("provider API returned 503".into()))
        } else {
            Ok(())
        }
    }
}

impl ComputeService for StaticCompute {
    async fn list_hardware_flavors(&self) -> SyncResult<Vec<HardwareFlavor>> {
        self.check()?;
        Ok(self.hardware.clone())
    }

    async fn list_images(&self) -> SyncResult<Vec<ProviderImage>> {
        self.check()?;
        Ok(self.images.clone())
    }
}
