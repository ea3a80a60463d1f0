//! nimbus-sync — reconciliation watchdogs.
//!
//! Each watchdog compares one kind of provider resource against the stored
//! model and reports drift as [`Problem`]s on a shared bounded queue. What to
//! do about a problem is up to whoever drains the queue.
//!
//! # Architecture
//!
//! ```text
//! ComputeService ──→ Watchdog<HardwareReconciler> ──┐
//!        │                                            ├──→ ProblemQueue ──→ consumer
//!        └─────────→ Watchdog<ImageReconciler> ──────┘
//!                         │
//!                    StateStore (read-only)
//! ```
//!
//! Watchdogs run on their own cadence and share nothing but the model and the
//! queue. A full queue throttles them; no report is ever dropped.

pub mod compute;
pub mod error;
pub mod hardware;
pub mod image;
pub mod problem;
pub mod queue;
pub mod watchdog;

#[cfg(test)]
mod testing;

pub use compute::{ComputeService, ProviderId, SnapshotComputeService};
pub use error::{SyncError, SyncResult};
pub use hardware::{hardware_watchdog, HardwareWatchdog};
pub use image::{image_watchdog, ImageWatchdog};
pub use problem::{LiveResource, Problem, ProblemKind, ResourceKind};
pub use queue::{ProblemReceiver, ProblemSender};
pub use watchdog::{CycleReport, Watchdog};
