//! Watchdog error types.

use thiserror::Error;

/// Result type alias for watchdog operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures that abort a whole watchdog cycle. Item-level findings are
/// reported as problems instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("provider listing failed: {0}")]
    Provider(String),

    #[error("problem queue closed")]
    QueueClosed,

    #[error("model store error: {0}")]
    State(#[from] nimbus_state::StateError),
}
