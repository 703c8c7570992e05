//! The job primitive and adapters onto it.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Result of one job run.
pub type JobResult = Result<(), JobError>;

/// A cancellable unit of asynchronous work.
///
/// Implementations are immutable factories: `execute` may be called any
/// number of times and every call is an independent run. Work must observe
/// the cancellation token in a timely manner; a run that ignores it can
/// stall shutdown up to the supervisor's stop timeout and is then
/// abandoned.
#[async_trait]
pub trait Job: Send + Sync {
    /// Short name used for log attribution.
    fn name(&self) -> &str {
        "job"
    }

    /// Run the job to completion, failure, or cancellation.
    async fn execute(&self, cancel: CancellationToken) -> JobResult;
}

type JobFn = dyn Fn(CancellationToken) -> BoxFuture<'static, JobResult> + Send + Sync;

/// A job that wraps a single asynchronous function.
///
/// The token is forwarded to the function and its outcome is propagated
/// unchanged.
pub struct FnJob {
    name: String,
    function: Box<JobFn>,
}

impl FnJob {
    /// Create a job that executes the supplied function.
    pub fn new<F, Fut>(function: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        Self::named("job", function)
    }

    /// Create a named job that executes the supplied function.
    pub fn named<F, Fut>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            function: Box::new(move |cancel| Box::pin(function(cancel))),
        }
    }
}

#[async_trait]
impl Job for FnJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        (self.function)(cancel).await
    }
}

type Callback = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// Adapts a legacy synchronous `start()`/`stop()` pair into the
/// cancellation contract.
///
/// A run calls `start()`, parks until the token fires, calls `stop()`, and
/// then returns success. An error from `start()` fails the run before it
/// ever waits, and `stop()` is not invoked in that case; an error from
/// `stop()` is the run's failure.
pub struct StartStopJob {
    name: String,
    start: Box<Callback>,
    stop: Box<Callback>,
}

impl StartStopJob {
    /// Create a job from existing code that already uses start and stop
    /// semantics (e.g. an OS service body).
    pub fn new<S, T>(start: S, stop: T) -> Self
    where
        S: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
        T: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: "start-stop".to_string(),
            start: Box::new(start),
            stop: Box::new(stop),
        }
    }

    /// Override the name used for log attribution.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Job for StartStopJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, cancel: CancellationToken) -> JobResult {
        (self.start)().map_err(JobError::failed)?;
        tracing::debug!(job = self.name.as_str(), "started; waiting for cancellation");
        cancel.cancelled().await;
        (self.stop)().map_err(JobError::failed)?;
        Ok(())
    }
}
