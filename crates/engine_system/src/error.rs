//! Scheduler error types.

use engine_component::EcsError;

/// Errors returned by [`crate::PriorityScheduler`] management calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Registry or finalize misconfiguration.
    #[error(transparent)]
    Store(#[from] EcsError),

    /// An instance of this system kind is already registered; it was left
    /// untouched.
    #[error("system `{0}` is already registered")]
    AlreadyRegistered(&'static str),

    /// No instance of this system kind is registered.
    #[error("system `{0}` is not registered")]
    NotRegistered(&'static str),
}
