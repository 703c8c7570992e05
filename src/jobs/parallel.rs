//! Parallel composition.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{Job, JobResult};
use crate::error::JobError;

/// Executes child jobs concurrently.
///
/// Children run against a signal derived from the caller's token, so
/// external cancellation reaches all of them. Completions are drained one
/// at a time in arrival order; the first outcome that is neither success
/// nor an expected cancellation cancels the remaining siblings through the
/// derived signal's internal source, the rest are drained, and the
/// triggering failure becomes the overall outcome. Caller cancellation
/// yields a cancellation outcome; all-success yields success.
pub struct ParallelJob {
    jobs: Vec<Arc<dyn Job>>,
}

impl ParallelJob {
    pub fn new(jobs: Vec<Arc<dyn Job>>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Job for ParallelJob {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        // Internal source, linked under the caller's token: peer failure
        // cancels siblings without being conflated with a caller
        // cancellation, which already reaches every child through the link.
        let internal = cancel.child_token();

        let mut running: FuturesUnordered<_> = self
            .jobs
            .iter()
            .map(|job| {
                let job = Arc::clone(job);
                let token = internal.child_token();
                async move {
                    let name = job.name().to_string();
                    (name, job.execute(token).await)
                }
            })
            .collect();

        let mut first_failure: Option<JobError> = None;
        while let Some((name, result)) = running.next().await {
            match result {
                Ok(()) => {}
                Err(err) if err.is_cancellation() && internal.is_cancelled() => {
                    // Expected: the caller or a failed sibling asked for it.
                }
                Err(err) => {
                    tracing::warn!(
                        job = name.as_str(),
                        error = %err,
                        "parallel child failed; cancelling siblings"
                    );
                    if first_failure.is_none() {
                        internal.cancel();
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None if cancel.is_cancelled() => Err(JobError::Cancelled),
            None => Ok(()),
        }
    }
}
