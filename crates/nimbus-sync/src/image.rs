//! Machine image watchdog.

use std::sync::Arc;
use std::time::Duration;

use nimbus_core::CloudScopedId;
use nimbus_state::{Image, ReadScope, StateResult, StateStore};

use crate::compute::ComputeService;
use crate::error::SyncResult;
use crate::problem::ResourceKind;
use crate::queue::ProblemSender;
use crate::watchdog::{Listing, Reconciler, Watchdog};

pub struct ImageReconciler<C> {
    compute: Arc<C>,
}

impl<C> ImageReconciler<C> {
    pub fn new(compute: Arc<C>) -> Self {
        Self { compute }
    }
}

impl<C: ComputeService> Reconciler for ImageReconciler<C> {
    type Entity = Image;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Image
    }

    async fn fetch(&self) -> SyncResult<Listing> {
        let images = self.compute.list_images().await?;
        Ok(Listing::ingest(
            ResourceKind::Image,
            images.into_iter().map(|i| (i.id, i.name)),
        ))
    }

    fn lookup(&self, scope: &ReadScope<'_>, id: &CloudScopedId) -> StateResult<Option<Image>> {
        scope.image_in_cloud(id.base_id(), id.cloud())
    }
}

pub type ImageWatchdog<C> = Watchdog<ImageReconciler<C>>;

pub fn image_watchdog<C: ComputeService>(
    compute: Arc<C>,
    store: StateStore,
    problems: ProblemSender,
    interval: Duration,
) -> ImageWatchdog<C> {
    Watchdog::new(ImageReconciler::new(compute), store, problems, interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{ProviderId, ProviderImage};
    use crate::problem::ProblemKind;
    use crate::queue;
    use crate::testing::StaticCompute;
    use nimbus_state::LocationRef;

    #[tokio::test]
    async fn images_are_matched_by_base_id_and_cloud() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put(&Image {
                base_id: "ubuntu-22.04".into(),
                cloud: "cloud-1".into(),
                name: "Ubuntu 22.04".into(),
                operating_system: None,
                credentials: vec!["cred-a".into()],
                locations: vec![LocationRef {
                    cloud: "cloud-1".into(),
                    location: "eu-west".into(),
                }],
            })
            .unwrap();

        let image = |raw: &str| ProviderImage {
            id: ProviderId::Scoped(raw.into()),
            name: raw.into(),
            operating_system: Some("ubuntu".into()),
        };
        let compute = Arc::new(StaticCompute::images(vec![
            image("cred-a/cloud-1/eu-west/ubuntu-22.04"),
            // Same base id in another cloud is a different resource.
            image("cred-a/cloud-2/eu-west/ubuntu-22.04"),
            image("cred-a/cloud-1/ap-south/ubuntu-22.04"),
        ]));
        let (tx, mut rx) = queue::bounded(16);
        let dog = image_watchdog(compute, store, tx, Duration::from_secs(60));

        let report = dog.cycle().await.unwrap();
        assert_eq!(report.examined, 3);
        assert_eq!(report.problems, 2);

        let first = rx.try_take().unwrap();
        assert_eq!(first.kind(), &ProblemKind::NotInDatabase);
        assert_eq!(first.resource().kind, ResourceKind::Image);
        assert_eq!(rx.try_take().unwrap().kind(), &ProblemKind::MissingLocation);
        assert!(rx.try_take().is_none());
    }
}
