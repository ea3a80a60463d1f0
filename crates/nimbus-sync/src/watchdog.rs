//! The reconciliation loop shared by every resource kind.
//!
//! ```text
//! fetch listing ──→ for each live resource:
//!                     parse scoped id ──✗──→ MalformedIdentifier
//!                     lookup (base_id, cloud) ──✗──→ LookupFailed
//!                     absent ──→ NotInDatabase
//!                     present ──→ credential check, location check
//! ```
//!
//! Every resource is evaluated on its own, so one bad item never hides the
//! findings for the rest of the listing.

use std::future::Future;
use std::time::Duration;

use nimbus_core::CloudScopedId;
use nimbus_state::{Hardware, Image, LocationRef, ReadScope, StateResult, StateStore};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::compute::ProviderId;
use crate::error::{SyncError, SyncResult};
use crate::problem::{LiveResource, Problem, ProblemKind, ResourceKind};
use crate::queue::ProblemSender;

/// A model entity scoped to credentials and locations.
pub trait ScopedResource {
    fn credentials(&self) -> &[String];
    fn locations(&self) -> &[LocationRef];
}

impl ScopedResource for Hardware {
    fn credentials(&self) -> &[String] {
        &self.credentials
    }

    fn locations(&self) -> &[LocationRef] {
        &self.locations
    }
}

impl ScopedResource for Image {
    fn credentials(&self) -> &[String] {
        &self.credentials
    }

    fn locations(&self) -> &[LocationRef] {
        &self.locations
    }
}

/// Credential and location checks. Both always run.
pub fn scope_problems(entity: &impl ScopedResource, id: &CloudScopedId) -> Vec<ProblemKind> {
    let mut problems = Vec::new();
    if !entity.credentials().iter().any(|c| c == id.credential()) {
        problems.push(ProblemKind::MissingCredential);
    }
    if !entity
        .locations()
        .iter()
        .any(|l| l.cloud == id.cloud() && l.location == id.location())
    {
        problems.push(ProblemKind::MissingLocation);
    }
    problems
}

/// Live resources of one kind, narrowed to those with scoped ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub resources: Vec<LiveResource>,
    /// Provider-native items left out of reconciliation.
    pub skipped: usize,
}

impl Listing {
    pub fn ingest(kind: ResourceKind, items: impl IntoIterator<Item = (ProviderId, String)>) -> Self {
        let mut listing = Listing::default();
        for (id, name) in items {
            match id {
                ProviderId::Scoped(raw_id) => listing.resources.push(LiveResource {
                    kind,
                    raw_id,
                    name,
                }),
                ProviderId::Native(native) => {
                    debug!(%kind, id = %native, "skipping provider-native resource");
                    listing.skipped += 1;
                }
            }
        }
        listing
    }
}

/// Kind-specific half of a watchdog.
pub trait Reconciler: Send + Sync {
    type Entity: ScopedResource;

    fn kind(&self) -> ResourceKind;

    fn fetch(&self) -> impl Future<Output = SyncResult<Listing>> + Send;

    /// Find the model entity for `id` by `(base_id, cloud)`.
    fn lookup(&self, scope: &ReadScope<'_>, id: &CloudScopedId) -> StateResult<Option<Self::Entity>>;
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub examined: usize,
    pub skipped: usize,
    pub problems: usize,
}

pub struct Watchdog<R> {
    reconciler: R,
    store: StateStore,
    problems: ProblemSender,
    interval: Duration,
}

impl<R: Reconciler> Watchdog<R> {
    pub fn new(reconciler: R, store: StateStore, problems: ProblemSender, interval: Duration) -> Self {
        Self {
            reconciler,
            store,
            problems,
            interval,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.reconciler.kind()
    }

    /// Problems for a single live resource. Never fails.
    pub fn evaluate(&self, resource: &LiveResource) -> Vec<ProblemKind> {
        let id = match CloudScopedId::parse(&resource.raw_id) {
            Ok(id) => id,
            Err(e) => {
                return vec![ProblemKind::MalformedIdentifier {
                    reason: e.to_string(),
                }];
            }
        };

        match self.store.read(|tx| self.reconciler.lookup(tx, &id)) {
            Ok(None) => vec![ProblemKind::NotInDatabase],
            Ok(Some(entity)) => scope_problems(&entity, &id),
            Err(e) => vec![ProblemKind::LookupFailed {
                reason: e.to_string(),
            }],
        }
    }

    /// Run one full pass over the live listing.
    ///
    /// Fails only when the listing cannot be fetched or the queue is gone.
    pub async fn cycle(&self) -> SyncResult<CycleReport> {
        let kind = self.kind();
        let listing = self.reconciler.fetch().await?;
        let mut report = CycleReport {
            examined: listing.resources.len(),
            skipped: listing.skipped,
            problems: 0,
        };

        for resource in listing.resources {
            for found in self.evaluate(&resource) {
                warn!(%kind, resource = %resource.raw_id, problem = %found, "drift detected");
                self.problems
                    .report(Problem::new(found, resource.clone()))
                    .await?;
                report.problems += 1;
            }
        }

        debug!(
            %kind,
            examined = report.examined,
            skipped = report.skipped,
            problems = report.problems,
            "watchdog cycle complete"
        );
        Ok(report)
    }

    /// Run cycles every `interval` until `shutdown` flips or the queue closes.
    ///
    /// A cycle that has started always finishes; shutdown is observed between
    /// cycles.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let kind = self.kind();
        info!(%kind, interval = ?self.interval, "watchdog started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.cycle().await {
                Ok(_) => {}
                Err(SyncError::QueueClosed) => {
                    warn!(%kind, "problem queue closed, stopping watchdog");
                    break;
                }
                Err(e) => error!(%kind, error = %e, "watchdog cycle failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    debug!(%kind, "watchdog shutting down");
                    break;
                }
            }
        }

        info!(%kind, "watchdog stopped");
    }
}
