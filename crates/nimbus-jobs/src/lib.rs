//! nimbus-jobs — remote resource jobs.
//!
//! A job owns one attempt at bringing a model entity in line with a remote
//! resource. The external scheduler decides when a job runs and whether a
//! failed attempt is retried; this crate decides what an attempt does.
//!
//! # Architecture
//!
//! ```text
//! runner::run(job)
//!   ├── job.can_start()        read scope, never mutates
//!   ├── job.do_work()          lifecycle calls between short model scopes
//!   └── job.on_error(err)      mark failed, optional compensating undeploy
//!
//! CreateInstanceJob
//!   ├── StateStore             (instance, vm, application, components)
//!   ├── LifecycleConnector     (one client per attempt)
//!   └── ModelValidator         (application graph checks)
//! ```

pub mod convert;
pub mod create_instance;
pub mod error;
pub mod job;
pub mod runner;
pub mod validation;

#[cfg(test)]
mod mock;

pub use create_instance::{CreateInstanceJob, CreateInstanceOptions};
pub use error::{JobError, JobFault, JobResult, JobStep};
pub use job::{Compensation, RemoteResourceJob};
pub use runner::{run, JobFailure, JobOutcome, JobPhase};
pub use validation::{ApplicationGraphValidator, ModelValidator};
