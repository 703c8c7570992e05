//! Error handling for the job runtime.
//!
//! The taxonomy distinguishes the outcomes the supervisor cares about:
//!
//! - **Cancellation** ([`JobError::Cancelled`]): the expected outcome while
//!   a stop is in progress. Never surfaced as a fault; swallowed at the
//!   boundary where cancellation was the cause.
//! - **Programming errors** ([`JobError::InvalidState`],
//!   [`JobError::Configuration`]): reported synchronously from the call
//!   that detects them, never deferred into the background execution.
//! - **Job failures** ([`JobError::Failed`]): anything user work raises.
//!   These propagate through the combinators up to the supervisor's fault
//!   notification.

use std::sync::Arc;

use thiserror::Error;

/// Error type shared by jobs, combinators, and the job service.
///
/// Cheaply clonable so a single failure can be delivered both through the
/// fault subscription and to a caller awaiting the run.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The run observed cancellation and unwound.
    #[error("job was cancelled")]
    Cancelled,

    /// An operation was invoked in a state that does not permit it.
    #[error("invalid service state: {0}")]
    InvalidState(String),

    /// A job, schedule, or service was built with invalid settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// User work failed.
    #[error("job failed: {0}")]
    Failed(Arc<anyhow::Error>),
}

impl JobError {
    /// Wrap an arbitrary error as a job failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(err.into()))
    }

    /// True when this outcome is attributable to cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(Arc::new(err))
    }
}
