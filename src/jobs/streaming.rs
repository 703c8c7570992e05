//! Streaming composition.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{Job, JobResult};
use crate::error::JobError;

type JobStreamFactory = dyn Fn() -> BoxStream<'static, Arc<dyn Job>> + Send + Sync;

/// Consumes a lazily produced, possibly infinite sequence of jobs, one at
/// a time.
///
/// The factory is invoked once per run, so every run consumes a fresh
/// sequence. Consumption waits for the next element, executes it to
/// completion, then requests the next. It ends when the sequence is
/// exhausted (success), a consumed job fails (that failure), or the
/// caller's token fires (cancellation), after which no further elements
/// are requested.
pub struct StreamingJob {
    factory: Box<JobStreamFactory>,
}

impl StreamingJob {
    /// Create a streaming job from a stream factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> BoxStream<'static, Arc<dyn Job>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
        }
    }

    /// Convenience: stream over an already materialized list of jobs.
    pub fn from_jobs(jobs: Vec<Arc<dyn Job>>) -> Self {
        Self::new(move || futures::stream::iter(jobs.clone()).boxed())
    }
}

#[async_trait]
impl Job for StreamingJob {
    fn name(&self) -> &str {
        "streaming"
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        let mut stream = (self.factory)();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                next = stream.next() => next,
            };
            let Some(job) = next else {
                return Ok(());
            };
            tracing::debug!(job = job.name(), "streamed job available; executing");
            job.execute(cancel.clone()).await?;
        }
    }
}
