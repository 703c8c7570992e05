//! Schedule-driven composition.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Job, JobResult, Schedule};
use crate::error::JobError;

/// Re-executes one job at each schedule-produced time.
///
/// Each run walks an effectively infinite sequence: compute the next
/// scheduled time, suspend on the schedule's clock until it is reached or
/// until cancelled (whichever first), execute the wrapped job, repeat.
/// The run ends successfully once the occurrence function is exhausted or
/// the tick at the schedule's end time has executed.
pub struct ScheduledJob {
    job: Arc<dyn Job>,
    schedule: Schedule,
}

impl ScheduledJob {
    pub fn new(job: Arc<dyn Job>, schedule: Schedule) -> Self {
        Self { job, schedule }
    }

    /// The schedule driving this job.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}

#[async_trait]
impl Job for ScheduledJob {
    fn name(&self) -> &str {
        "scheduled"
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        let clock = Arc::clone(self.schedule.clock());
        loop {
            let Some(next) = self.schedule.next_scheduled_time() else {
                tracing::debug!(job = self.job.name(), "schedule exhausted");
                return Ok(());
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                _ = clock.sleep_until(next) => {}
            }
            tracing::debug!(
                job = self.job.name(),
                scheduled_for = %next,
                "scheduled time reached; executing"
            );
            self.job.execute(cancel.clone()).await?;
            if self.schedule.end_time() == Some(next) {
                tracing::debug!(job = self.job.name(), "end time reached; schedule complete");
                return Ok(());
            }
        }
    }
}
