//! Integration tests for the JobService lifecycle: start/stop state
//! machine, fault notification, and the bounded stop timeout.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobkit::prelude::*;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// A job that parks until cancelled, then unwinds as cancelled.
fn parked_job() -> Arc<dyn Job> {
    Arc::new(FnJob::new(|cancel: CancellationToken| async move {
        cancel.cancelled().await;
        Err(JobError::Cancelled)
    }))
}

fn failing_job(message: &'static str) -> Arc<dyn Job> {
    Arc::new(FnJob::new(move |_| async move {
        Err(JobError::failed(anyhow::anyhow!(message)))
    }))
}

#[tokio::test]
async fn start_stop_lifecycle() {
    init_test_logging();
    let started = Arc::new(AtomicBool::new(false));
    let stopped = Arc::new(AtomicBool::new(false));
    let job = StartStopJob::new(
        {
            let started = Arc::clone(&started);
            move || {
                started.store(true, Ordering::SeqCst);
                Ok(())
            }
        },
        {
            let stopped = Arc::clone(&stopped);
            move || {
                stopped.store(true, Ordering::SeqCst);
                Ok(())
            }
        },
    );

    let service = JobService::new(job.into_job());
    assert!(!service.is_running());

    assert_ok!(service.start().await);
    wait_until(|| started.load(Ordering::SeqCst)).await;
    assert!(service.is_running());

    assert_ok!(service.stop().await);
    assert!(stopped.load(Ordering::SeqCst));
    assert!(!service.is_running());
}

#[tokio::test]
async fn second_start_without_stop_is_an_invalid_state() {
    let service = JobService::new(parked_job());
    service.start().await.unwrap();

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, JobError::InvalidState(_)));
    assert!(service.is_running());

    service.stop().await.unwrap();
    assert!(!service.is_running());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let service = JobService::new(parked_job());
    service.stop().await.unwrap();

    service.start().await.unwrap();
    service.stop().await.unwrap();
    service.stop().await.unwrap();
    assert!(!service.is_running());
}

#[tokio::test]
async fn fault_notification_fires_on_job_failure() {
    init_test_logging();
    let service = JobService::new(failing_job("boom"));
    let mut fault = service.fault();

    service.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            fault.changed().await.unwrap();
            if fault.borrow().is_some() {
                break;
            }
        }
    })
    .await
    .expect("fault notification should fire");

    let observed = fault.borrow().clone().unwrap();
    assert!(matches!(observed, JobError::Failed(_)));

    // The faulted service reads as stopped and accepts a restart.
    wait_until(|| !service.is_running()).await;
    service.start().await.unwrap();
    service.stop().await.unwrap();
}

#[tokio::test]
async fn late_subscriber_still_observes_the_fault() {
    let service = JobService::new(failing_job("boom"));
    service.start().await.unwrap();
    wait_until(|| !service.is_running()).await;

    let fault = service.fault();
    assert!(fault.borrow().is_some());
}

#[tokio::test]
async fn start_resets_the_fault_notification() {
    let service = JobService::new(failing_job("boom"));
    service.start().await.unwrap();
    wait_until(|| service.fault().borrow().is_some()).await;
    service.stop().await.unwrap();

    service.start().await.unwrap();
    // A fresh run fires again; the reset makes that observable as a new
    // change rather than a stale value.
    wait_until(|| service.fault().borrow().is_some()).await;
    service.stop().await.unwrap();
}

#[tokio::test]
async fn cancellation_during_stop_is_not_a_fault() {
    let service = JobService::new(parked_job());
    let fault = service.fault();

    service.start().await.unwrap();
    service.stop().await.unwrap();
    assert!(fault.borrow().is_none());
}

#[tokio::test]
async fn stop_waits_for_cleanup_faster_than_the_timeout() {
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let job = {
        let cleaned_up = Arc::clone(&cleaned_up);
        Arc::new(FnJob::new(move |cancel: CancellationToken| {
            let cleaned_up = Arc::clone(&cleaned_up);
            async move {
                cancel.cancelled().await;
                tokio::time::sleep(Duration::from_millis(100)).await;
                cleaned_up.store(true, Ordering::SeqCst);
                Ok(())
            }
        })) as Arc<dyn Job>
    };

    let service = JobService::with_config(
        job,
        JobServiceConfig {
            stop_timeout: Duration::from_secs(1),
            ..Default::default()
        },
    );

    service.start().await.unwrap();
    service.stop().await.unwrap();
    assert!(cleaned_up.load(Ordering::SeqCst));
    assert!(!service.is_running());
}

#[tokio::test]
async fn stop_abandons_cleanup_slower_than_the_timeout() {
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let job = {
        let cleaned_up = Arc::clone(&cleaned_up);
        Arc::new(FnJob::new(move |cancel: CancellationToken| {
            let cleaned_up = Arc::clone(&cleaned_up);
            async move {
                cancel.cancelled().await;
                tokio::time::sleep(Duration::from_secs(1)).await;
                cleaned_up.store(true, Ordering::SeqCst);
                Ok(())
            }
        })) as Arc<dyn Job>
    };

    let service = JobService::with_config(
        job,
        JobServiceConfig {
            stop_timeout: Duration::from_millis(100),
            ..Default::default()
        },
    );
    let fault = service.fault();

    service.start().await.unwrap();
    service.stop().await.unwrap();
    // Stop returned at the timeout: cleanup is still in flight and no
    // fault is raised for the abandoned run.
    assert!(!cleaned_up.load(Ordering::SeqCst));
    assert!(!service.is_running());
    assert!(fault.borrow().is_none());
}

#[tokio::test]
async fn stop_swallows_failures_by_default() {
    let service = JobService::new(failing_job("boom"));
    service.start().await.unwrap();
    wait_until(|| !service.is_running()).await;

    service.stop().await.unwrap();
}

#[tokio::test]
async fn rethrow_on_stop_surfaces_the_failure() {
    let service = JobService::with_config(
        failing_job("boom"),
        JobServiceConfig {
            rethrow_on_stop: true,
            ..Default::default()
        },
    );
    service.start().await.unwrap();
    wait_until(|| !service.is_running()).await;

    let err = service.stop().await.unwrap_err();
    assert!(matches!(err, JobError::Failed(_)));
}

#[tokio::test]
async fn handled_faults_are_not_rethrown() {
    let handled = Arc::new(AtomicUsize::new(0));
    let service = JobService::with_config(
        failing_job("boom"),
        JobServiceConfig {
            rethrow_on_stop: true,
            ..Default::default()
        },
    )
    .with_fault_handler({
        let handled = Arc::clone(&handled);
        move |_| {
            handled.fetch_add(1, Ordering::SeqCst);
            true
        }
    });

    service.start().await.unwrap();
    wait_until(|| !service.is_running()).await;

    service.stop().await.unwrap();
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_job_surfaces_as_a_fault() {
    let job: Arc<dyn Job> = Arc::new(FnJob::new(|_| async {
        panic!("job blew up");
    }));
    let service = JobService::new(job);
    let fault = service.fault();

    service.start().await.unwrap();
    wait_until(|| fault.borrow().is_some()).await;

    let observed = fault.borrow().clone().unwrap();
    assert!(matches!(observed, JobError::Failed(_)));
    assert!(observed.to_string().contains("panicked"));

    service.stop().await.unwrap();
}
