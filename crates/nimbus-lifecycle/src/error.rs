//! Lifecycle protocol error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for lifecycle protocol calls.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Failure of a single lifecycle protocol call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("lifecycle agent at {address} unreachable: {reason}")]
    TransportUnreachable { address: String, reason: String },

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("deployment context initialization failed: {0}")]
    ContextInitFailed(String),

    #[error("deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("component instance {id} not running after {waited:?}")]
    DeploymentTimeout { id: String, waited: Duration },

    #[error("undeployment failed: {0}")]
    UndeploymentFailed(String),
}

impl LifecycleError {
    /// Whether a fresh client for the same address may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportUnreachable { .. })
    }
}
