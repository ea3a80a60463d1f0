//! Drives a [`RemoteResourceJob`] through one attempt.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{JobError, JobFault, JobStep};
use crate::job::{Compensation, RemoteResourceJob};

/// Phase of a job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    NotStarted,
    Running,
    Done,
    Compensating,
    Failed,
    Skipped,
}

/// Structured failure record handed back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub step: JobStep,
    pub cause: String,
    pub entity: String,
    /// Whether a new attempt may succeed.
    pub retryable: bool,
    pub compensation: Compensation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Skipped,
    Succeeded,
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

fn transition(entity: &str, from: JobPhase, to: JobPhase) {
    debug!(entity, ?from, ?to, "job phase");
}

fn failure(error: &JobError, compensation: Compensation) -> JobFailure {
    JobFailure {
        step: error.step,
        cause: error.fault.to_string(),
        entity: error.entity.clone(),
        retryable: error.is_retryable(),
        compensation,
    }
}

/// Run one attempt of `job` to completion or compensation.
pub async fn run<J: RemoteResourceJob>(job: &J) -> JobOutcome {
    let entity = job.entity();

    match job.can_start() {
        Ok(true) => {}
        Ok(false) => {
            transition(entity, JobPhase::NotStarted, JobPhase::Skipped);
            info!(entity, "dependencies not ready, job skipped");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            transition(entity, JobPhase::NotStarted, JobPhase::Failed);
            error!(entity, error = %e, "job could not check its dependencies");
            return JobOutcome::Failed(failure(&e, Compensation::NotCompensable));
        }
    }

    transition(entity, JobPhase::NotStarted, JobPhase::Running);
    let err = match job.do_work().await {
        Ok(()) => {
            transition(entity, JobPhase::Running, JobPhase::Done);
            info!(entity, "job succeeded");
            return JobOutcome::Succeeded;
        }
        Err(e) => e,
    };

    error!(entity, step = %err.step, error = %err.fault, "job failed");
    transition(entity, JobPhase::Running, JobPhase::Compensating);

    let compensation = match job.on_error(&err).await {
        Ok(done) => done,
        Err(JobError {
            fault: JobFault::MissingRemoteId { .. },
            ..
        }) => {
            debug!(entity, "nothing was deployed, no compensation needed");
            Compensation::NotCompensable
        }
        Err(comp) => {
            warn!(entity, step = %comp.step, error = %comp.fault, "compensation failed");
            Compensation::Failed(comp.to_string())
        }
    };

    transition(entity, JobPhase::Compensating, JobPhase::Failed);
    JobOutcome::Failed(failure(&err, compensation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobResult;
    use nimbus_lifecycle::LifecycleError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A job whose every hook is scripted.
    struct Scripted {
        ready: bool,
        work: fn() -> JobResult<()>,
        compensate: fn() -> JobResult<Compensation>,
        worked: AtomicUsize,
        compensated: AtomicUsize,
    }

    impl Scripted {
        fn new(
            ready: bool,
            work: fn() -> JobResult<()>,
            compensate: fn() -> JobResult<Compensation>,
        ) -> Self {
            Self {
                ready,
                work,
                compensate,
                worked: AtomicUsize::new(0),
                compensated: AtomicUsize::new(0),
            }
        }
    }

    impl RemoteResourceJob for Scripted {
        fn entity(&self) -> &str {
            "instance i-1"
        }

        fn can_start(&self) -> JobResult<bool> {
            Ok(self.ready)
        }

        async fn do_work(&self) -> JobResult<()> {
            self.worked.fetch_add(1, Ordering::SeqCst);
            (self.work)()
        }

        async fn on_error(&self, _error: &JobError) -> JobResult<Compensation> {
            self.compensated.fetch_add(1, Ordering::SeqCst);
            (self.compensate)()
        }
    }

    fn deploy_failed() -> JobResult<()> {
        Err(JobError::new(
            JobStep::Deploy,
            "instance i-1",
            LifecycleError::DeploymentFailed("no space".into()),
        ))
    }

    fn compensated() -> JobResult<Compensation> {
        Ok(Compensation::Compensated)
    }

    #[tokio::test]
    async fn not_ready_job_is_skipped_without_work() {
        let job = Scripted::new(false, || Ok(()), compensated);
        assert_eq!(run(&job).await, JobOutcome::Skipped);
        assert_eq!(job.worked.load(Ordering::SeqCst), 0);
        assert_eq!(job.compensated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_job_is_not_compensated() {
        let job = Scripted::new(true, || Ok(()), compensated);
        assert!(run(&job).await.is_success());
        assert_eq!(job.compensated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_compensated_exactly_once() {
        let job = Scripted::new(true, deploy_failed, compensated);
        let outcome = run(&job).await;
        let failure = outcome.failure().unwrap();

        assert_eq!(failure.step, JobStep::Deploy);
        assert_eq!(failure.entity, "instance i-1");
        assert!(failure.cause.contains("no space"));
        assert!(!failure.retryable);
        assert_eq!(failure.compensation, Compensation::Compensated);
        assert_eq!(job.compensated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_remote_id_means_not_compensable() {
        let job = Scripted::new(true, deploy_failed, || {
            Err(JobError::new(
                JobStep::Undeploy,
                "instance i-1",
                JobFault::MissingRemoteId {
                    instance: "i-1".into(),
                },
            ))
        });
        let outcome = run(&job).await;
        assert_eq!(
            outcome.failure().unwrap().compensation,
            Compensation::NotCompensable
        );
    }

    #[tokio::test]
    async fn compensation_failure_keeps_original_cause() {
        let job = Scripted::new(true, deploy_failed, || {
            Err(JobError::new(
                JobStep::Undeploy,
                "instance i-1",
                LifecycleError::UndeploymentFailed("agent refused".into()),
            ))
        });
        let outcome = run(&job).await;
        let failure = outcome.failure().unwrap();

        assert_eq!(failure.step, JobStep::Deploy);
        assert!(failure.cause.contains("no space"));
        assert!(matches!(&failure.compensation, Compensation::Failed(msg) if msg.contains("agent refused")));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(JobOutcome::Succeeded).unwrap();
        assert_eq!(json["outcome"], "succeeded");
    }
}
