//! Time source abstraction for schedules.
//!
//! Schedules never read the system clock directly; they go through
//! [`Clock`] so time-driven behavior can be tested deterministically with
//! [`ManualClock`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// A source of the current time plus a cancellable suspension primitive.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until the clock reaches `deadline`.
    ///
    /// Returns immediately when the deadline has already passed. The wait
    /// is cancelled by dropping the future, e.g. inside `tokio::select!`.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Wall-clock time driven by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let now = Utc::now();
        if deadline <= now {
            return;
        }
        if let Ok(remaining) = (deadline - now).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}

/// A manually advanced clock for tests.
///
/// Sleepers wake as soon as [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) moves the clock to or past their deadline.
/// Clones observe the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_tx: Arc<watch::Sender<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock pinned to `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        let (now_tx, _) = watch::channel(start);
        Self {
            now_tx: Arc::new(now_tx),
        }
    }

    /// Move the clock forward by `duration` (millisecond granularity).
    pub fn advance(&self, duration: std::time::Duration) {
        let delta = chrono::Duration::milliseconds(duration.as_millis() as i64);
        self.now_tx.send_modify(|now| *now = *now + delta);
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        self.now_tx.send_replace(to);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now_tx.borrow()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut now_rx = self.now_tx.subscribe();
        loop {
            if *now_rx.borrow_and_update() >= deadline {
                return;
            }
            if now_rx.changed().await.is_err() {
                // Clock dropped: time will never advance again.
                std::future::pending::<()>().await;
            }
        }
    }
}
