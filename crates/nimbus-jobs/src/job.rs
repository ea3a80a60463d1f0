//! The remote resource job capability.
//!
//! A job manages one model entity that mirrors a remote resource. It is
//! created for a single attempt by an external scheduler and driven through
//! [`crate::runner::run`]:
//!
//! ```text
//! NotStarted ──can_start:false──→ Skipped
//!     │
//!  can_start:true
//!     ▼
//!  Running ──do_work:Ok──→ Done
//!     │
//!  do_work:Err
//!     ▼
//! Compensating ──on_error──→ Failed
//! ```
//!
//! Retries are new job values; a job never re-enters `Running`.

use std::future::Future;

use serde::Serialize;

use crate::error::{JobError, JobResult};

/// What `on_error` did about a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
    /// The remote side effect was rolled back.
    Compensated,
    /// Compensation is switched off by configuration.
    Disabled,
    /// The attempt failed before any remote resource was bound.
    NotCompensable,
    /// Compensation was attempted and failed.
    Failed(String),
}

pub trait RemoteResourceJob: Send + Sync {
    /// Reference to the managed entity, for logs and failure records.
    fn entity(&self) -> &str;

    /// Whether the entities this job depends on are ready. Never mutates.
    fn can_start(&self) -> JobResult<bool>;

    /// Run the remote operation and persist its result.
    fn do_work(&self) -> impl Future<Output = JobResult<()>> + Send;

    /// Compensate for a failed `do_work`. Called exactly once per failure.
    fn on_error(&self, error: &JobError) -> impl Future<Output = JobResult<Compensation>> + Send;
}
