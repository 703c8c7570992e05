//! # jobkit
//!
//! Lifecycle-managed execution of cancellable background jobs.
//!
//! - **Job**: the atomic unit, an asynchronous operation that runs until
//!   completion or until told to cancel.
//! - **Combinators**: sequential, parallel, streaming, and schedule-driven
//!   composition of jobs.
//! - **Schedule**: future execution timestamps produced by an opaque
//!   next-occurrence function (e.g. a crontab expression), bounded by an
//!   optional end time, over a pluggable clock.
//! - **JobService**: the supervisor, a start/stop state machine that runs
//!   one (possibly composite) job in the background, surfaces faults, and
//!   enforces a bounded stop timeout.
//!
//! ```rust,ignore
//! use jobkit::prelude::*;
//!
//! let heartbeat = FnJob::named("heartbeat", |cancel| async move {
//!     // ... do one round of work, checking `cancel` at suspension points
//!     Ok(())
//! });
//!
//! let service = JobService::new(
//!     heartbeat.scheduled(Schedule::cron("*/30 * * * * *")?).into_job(),
//! );
//! service.start().await?;
//! // ... later, from the host adapter's shutdown path:
//! service.stop().await?;
//! ```

pub mod clock;
pub mod error;
pub mod jobs;
pub mod service;

pub use error::JobError;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::JobError;
    pub use crate::jobs::{
        FnJob, Job, JobExt, JobResult, ParallelJob, Schedule, ScheduledJob, SequentialJob,
        StartStopJob, StreamingJob,
    };
    pub use crate::service::{FaultHandler, JobService, JobServiceConfig};
}
