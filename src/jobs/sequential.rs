//! Sequential composition.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Job, JobResult};
use crate::error::JobError;

/// Executes child jobs one after another, passing the same cancellation
/// token to each.
///
/// Stops at the first failure or at cancellation observed between children
/// and propagates that outcome as its own. An empty sequence succeeds.
pub struct SequentialJob {
    jobs: Vec<Arc<dyn Job>>,
}

impl SequentialJob {
    pub fn new(jobs: Vec<Arc<dyn Job>>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Job for SequentialJob {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        for job in &self.jobs {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            tracing::debug!(job = job.name(), "executing next job in sequence");
            job.execute(cancel.clone()).await?;
        }
        Ok(())
    }
}
