//! The job supervisor.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::JobError;
use crate::jobs::Job;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings for [`JobService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobServiceConfig {
    /// How long `stop` waits for in-flight work before abandoning it.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// Re-raise an unhandled job failure from `stop` when its completion
    /// was observed within the timeout. Off by default: failures are
    /// delivered through the fault subscription either way.
    pub rethrow_on_stop: bool,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(3),
            rethrow_on_stop: false,
        }
    }
}

/// Strategy invoked once per fault, before the failure propagates to
/// anyone awaiting the run.
///
/// Returning `true` marks the fault handled, which suppresses the opt-in
/// re-raise from `stop`.
pub type FaultHandler = Arc<dyn Fn(&JobError) -> bool + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════════════
// Supervisor
// ═══════════════════════════════════════════════════════════════════════════════

struct RunningJob {
    cancellation: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

enum RunOutcome {
    Success,
    Cancelled,
    Faulted { error: JobError, handled: bool },
}

/// Supervises one (possibly composite) job: start/stop lifecycle, fault
/// detection, and bounded shutdown.
///
/// `start` and `stop` are mutually exclusive under a single lock, so state
/// transitions are atomic from the caller's perspective and a concurrent
/// start/stop race can never produce two live execution handles. Work runs
/// on the tokio runtime; `start` returns as soon as the run is dispatched.
pub struct JobService {
    job: Arc<dyn Job>,
    config: JobServiceConfig,
    fault_handler: Option<FaultHandler>,
    fault_tx: watch::Sender<Option<JobError>>,
    lifecycle: tokio::sync::Mutex<()>,
    state: Mutex<Option<RunningJob>>,
}

impl JobService {
    /// Create a service with default settings.
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self::with_config(job, JobServiceConfig::default())
    }

    /// Create a service with the supplied settings.
    pub fn with_config(job: Arc<dyn Job>, config: JobServiceConfig) -> Self {
        let (fault_tx, _) = watch::channel(None);
        Self {
            job,
            config,
            fault_handler: None,
            fault_tx,
            lifecycle: tokio::sync::Mutex::new(()),
            state: Mutex::new(None),
        }
    }

    /// Install a fault-handling strategy.
    pub fn with_fault_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&JobError) -> bool + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    /// True while a live execution is present.
    ///
    /// A run that faulted counts as stopped the moment its execution
    /// finishes: the service never looks running while actually dead.
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .map(|running| !running.handle.is_finished())
            .unwrap_or(false)
    }

    /// Subscribe to fault notifications.
    ///
    /// The receiver holds `Some(error)` once the current run has faulted;
    /// it is reset to `None` by the next `start`. Fired at most once per
    /// run, before the failure propagates to anyone awaiting the run, and
    /// observable by subscribers that arrive after the fact.
    pub fn fault(&self) -> watch::Receiver<Option<JobError>> {
        self.fault_tx.subscribe()
    }

    /// Start supervising the job on the background runtime.
    ///
    /// Fails with [`JobError::InvalidState`] when a run is already live.
    /// Each successful call begins a new execution epoch with a fresh
    /// cancellation token.
    pub async fn start(&self) -> Result<(), JobError> {
        let _lifecycle = self.lifecycle.lock().await;

        let mut state = self.state.lock();
        if state
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return Err(JobError::InvalidState(
                "service is already running".to_string(),
            ));
        }

        self.fault_tx.send_replace(None);
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            Arc::clone(&self.job),
            cancellation.clone(),
            self.fault_tx.clone(),
            self.fault_handler.clone(),
        ));
        *state = Some(RunningJob {
            cancellation,
            handle,
        });
        info!(job = self.job.name(), "job service started");
        Ok(())
    }

    /// Stop the current run, waiting at most the configured stop timeout.
    ///
    /// Idempotent: a no-op when nothing is running. When the run does not
    /// finish within the timeout it is abandoned: the work may keep
    /// running in the background with no further supervision, and whether
    /// it ultimately failed is not reported. A failure whose completion is
    /// observed within the timeout is swallowed unless
    /// [`JobServiceConfig::rethrow_on_stop`] is set and the fault handler
    /// did not report it handled; cancellation outcomes are always
    /// swallowed.
    pub async fn stop(&self) -> Result<(), JobError> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(running) = self.state.lock().take() else {
            return Ok(());
        };
        let RunningJob {
            cancellation,
            mut handle,
        } = running;

        debug!(job = self.job.name(), "stop requested; cancelling current run");
        cancellation.cancel();

        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Err(_elapsed) => {
                warn!(
                    job = self.job.name(),
                    timeout = ?self.config.stop_timeout,
                    "stop timeout elapsed; abandoning in-flight run"
                );
                Ok(())
            }
            Ok(Ok(RunOutcome::Success)) | Ok(Ok(RunOutcome::Cancelled)) => {
                info!(job = self.job.name(), "job service stopped");
                Ok(())
            }
            Ok(Ok(RunOutcome::Faulted { error, handled })) => {
                info!(job = self.job.name(), "job service stopped after fault");
                if self.config.rethrow_on_stop && !handled {
                    Err(error)
                } else {
                    Ok(())
                }
            }
            Ok(Err(join_error)) => {
                // Panics inside the job are caught by the supervised run,
                // so the task itself dying is unexpected.
                error!(job = self.job.name(), error = %join_error, "supervised task failed");
                let error = JobError::failed(anyhow::anyhow!(
                    "supervised task failed: {join_error}"
                ));
                if self.config.rethrow_on_stop {
                    Err(error)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// The supervised run: executes the job, converts panics into failures,
/// and fires the fault notification before the outcome reaches whoever
/// awaits the handle.
async fn supervise(
    job: Arc<dyn Job>,
    cancellation: CancellationToken,
    fault_tx: watch::Sender<Option<JobError>>,
    fault_handler: Option<FaultHandler>,
) -> RunOutcome {
    let result = std::panic::AssertUnwindSafe(job.execute(cancellation))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(JobError::failed(anyhow::anyhow!(
                "job panicked: {}",
                panic_message(&panic)
            )))
        });

    match result {
        Ok(()) => {
            debug!(job = job.name(), "job completed");
            RunOutcome::Success
        }
        Err(err) if err.is_cancellation() => {
            debug!(job = job.name(), "job run cancelled");
            RunOutcome::Cancelled
        }
        Err(err) => {
            error!(job = job.name(), error = %err, "job faulted");
            fault_tx.send_replace(Some(err.clone()));
            let handled = fault_handler
                .as_ref()
                .map(|handler| handler(&err))
                .unwrap_or(false);
            RunOutcome::Faulted {
                error: err,
                handled,
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
