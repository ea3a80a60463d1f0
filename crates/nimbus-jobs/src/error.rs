//! Job error types.
//!
//! A [`JobFault`] is what went wrong; a [`JobError`] adds where it went wrong
//! (the [`JobStep`]) and on which managed entity.

use std::fmt;

use nimbus_lifecycle::LifecycleError;
use nimbus_state::StateError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// The underlying cause of a job step failure.
#[derive(Debug, Error)]
pub enum JobFault {
    #[error("virtual machine {vm} has no public address")]
    NoAddressAssigned { vm: String },

    #[error("instance {instance} has no component instance bound")]
    MissingRemoteId { instance: String },

    #[error("application {application} is invalid: {}", .violations.join("; "))]
    ValidationFailed {
        application: String,
        violations: Vec<String>,
    },

    #[error("operating system family {0} is not supported by the lifecycle agent")]
    UnsupportedOs(String),

    #[error("docker component {0} has no image")]
    MissingImage(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("model store: {0}")]
    State(#[from] StateError),
}

impl JobFault {
    /// Whether a fresh job attempt may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lifecycle(e) if e.is_retryable())
    }
}

/// Step of a job a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStep {
    CheckDependencies,
    ResolveAddress,
    Connect,
    ValidateModel,
    DeriveIdentifiers,
    RegisterInstance,
    RegisterComponents,
    InitContext,
    RegisterContext,
    BuildDescriptor,
    ResolveOs,
    Deploy,
    PersistRemoteId,
    WaitForDeployment,
    MarkRunning,
    MarkFailed,
    Undeploy,
    MarkDeleted,
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CheckDependencies => "checking dependencies",
            Self::ResolveAddress => "resolving host address",
            Self::Connect => "connecting to lifecycle agent",
            Self::ValidateModel => "validating application model",
            Self::DeriveIdentifiers => "deriving protocol identifiers",
            Self::RegisterInstance => "registering application instance",
            Self::RegisterComponents => "registering application components",
            Self::InitContext => "initializing deployment context",
            Self::RegisterContext => "registering component in deployment context",
            Self::BuildDescriptor => "building deployable component",
            Self::ResolveOs => "resolving operating system",
            Self::Deploy => "deploying component",
            Self::PersistRemoteId => "persisting component instance id",
            Self::WaitForDeployment => "waiting for deployment",
            Self::MarkRunning => "marking instance running",
            Self::MarkFailed => "marking instance failed",
            Self::Undeploy => "undeploying component",
            Self::MarkDeleted => "marking instance deleted",
        };
        f.write_str(text)
    }
}

/// A job step failure, carrying the step and the managed entity.
#[derive(Debug, Error)]
#[error("{step} failed for {entity}: {fault}")]
pub struct JobError {
    pub step: JobStep,
    pub entity: String,
    #[source]
    pub fault: JobFault,
}

impl JobError {
    pub fn new(step: JobStep, entity: impl Into<String>, fault: impl Into<JobFault>) -> Self {
        Self {
            step,
            entity: entity.into(),
            fault: fault.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.fault.is_retryable()
    }
}

/// Attach step context to any result whose error converts into a [`JobFault`].
pub trait StepContext<T> {
    fn step(self, step: JobStep, entity: &str) -> JobResult<T>;
}

impl<T, E: Into<JobFault>> StepContext<T> for Result<T, E> {
    fn step(self, step: JobStep, entity: &str) -> JobResult<T> {
        self.map_err(|e| JobError::new(step, entity, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn step_context_preserves_cause() {
        let result: Result<(), LifecycleError> =
            Err(LifecycleError::DeploymentFailed("disk full".into()));
        let err = result.step(JobStep::Deploy, "instance i-1").unwrap_err();

        assert_eq!(err.step, JobStep::Deploy);
        assert_eq!(err.entity, "instance i-1");
        assert!(err.to_string().starts_with("deploying component failed for instance i-1"));
        assert!(err.source().unwrap().to_string().contains("disk full"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_faults_are_retryable() {
        let fault = JobFault::from(LifecycleError::TransportUnreachable {
            address: "10.0.0.5:33033".into(),
            reason: "refused".into(),
        });
        assert!(fault.is_retryable());
        assert!(!JobFault::MissingRemoteId { instance: "i-1".into() }.is_retryable());
    }

    #[test]
    fn validation_fault_lists_violations() {
        let fault = JobFault::ValidationFailed {
            application: "shop".into(),
            violations: vec!["a".into(), "b".into()],
        };
        assert_eq!(fault.to_string(), "application shop is invalid: a; b");
    }
}
