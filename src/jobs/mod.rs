//! Cancellable background jobs and their composition algebra.
//!
//! The atomic unit is the [`Job`] trait: execute, given a cancellation
//! token, to completion or failure, respecting cancellation promptly.
//! Everything else composes jobs into bigger jobs:
//!
//! ```text
//!   FnJob / StartStopJob          the leaves
//!        │
//!        ▼
//!   SequentialJob ──► one after another, stop at first failure
//!   ParallelJob   ──► concurrent, cancel siblings on first failure
//!   StreamingJob  ──► lazy sequence, one element at a time
//!   ScheduledJob  ──► re-execute at each Schedule-produced time
//!        │
//!        ▼
//!   JobService    ──► start/stop supervision (see [`crate::service`])
//! ```
//!
//! Jobs carry no identity or persisted state; they are immutable factories
//! and every `execute` call is an independent run.

pub mod job;
pub mod parallel;
pub mod schedule;
pub mod scheduled;
pub mod sequential;
pub mod streaming;

pub use job::{FnJob, Job, JobResult, StartStopJob};
pub use parallel::ParallelJob;
pub use schedule::Schedule;
pub use scheduled::ScheduledJob;
pub use sequential::SequentialJob;
pub use streaming::StreamingJob;

use std::sync::Arc;

/// Combinator conveniences available on any job type.
pub trait JobExt: Job + Sized + 'static {
    /// Erase the concrete type for use with the combinators.
    fn into_job(self) -> Arc<dyn Job> {
        Arc::new(self)
    }

    /// Re-execute this job at each time the schedule produces.
    fn scheduled(self, schedule: Schedule) -> ScheduledJob {
        ScheduledJob::new(self.into_job(), schedule)
    }
}

impl<J: Job + Sized + 'static> JobExt for J {}
