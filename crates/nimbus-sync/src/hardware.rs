//! Hardware flavor watchdog.

use std::sync::Arc;
use std::time::Duration;

use nimbus_core::CloudScopedId;
use nimbus_state::{Hardware, ReadScope, StateResult, StateStore};

use crate::compute::ComputeService;
use crate::error::SyncResult;
use crate::problem::ResourceKind;
use crate::queue::ProblemSender;
use crate::watchdog::{Listing, Reconciler, Watchdog};

pub struct HardwareReconciler<C> {
    compute: Arc<C>,
}

impl<C> HardwareReconciler<C> {
    pub fn new(compute: Arc<C>) -> Self {
        Self { compute }
    }
}

impl<C: ComputeService> Reconciler for HardwareReconciler<C> {
    type Entity = Hardware;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Hardware
    }

    async fn fetch(&self) -> SyncResult<Listing> {
        let flavors = self.compute.list_hardware_flavors().await?;
        Ok(Listing::ingest(
            ResourceKind::Hardware,
            flavors.into_iter().map(|f| (f.id, f.name)),
        ))
    }

    fn lookup(&self, scope: &ReadScope<'_>, id: &CloudScopedId) -> StateResult<Option<Hardware>> {
        scope.hardware_in_cloud(id.base_id(), id.cloud())
    }
}

pub type HardwareWatchdog<C> = Watchdog<HardwareReconciler<C>>;

pub fn hardware_watchdog<C: ComputeService>(
    compute: Arc<C>,
    store: StateStore,
    problems: ProblemSender,
    interval: Duration,
) -> HardwareWatchdog<C> {
    Watchdog::new(HardwareReconciler::new(compute), store, problems, interval)
}
