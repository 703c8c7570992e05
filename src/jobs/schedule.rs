//! Execution schedules.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::JobError;

type NextOccurrence = dyn Fn(DateTime<Utc>) -> Option<DateTime<Utc>> + Send + Sync;

/// A source of future execution timestamps, bounded by an optional end
/// time.
///
/// Occurrences are always computed from the clock's current time, so
/// clones (and repeated runs of a scheduled job) never share iteration
/// state.
#[derive(Clone)]
pub struct Schedule {
    next_occurrence: Arc<NextOccurrence>,
    clock: Arc<dyn Clock>,
    end_time: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Create a schedule from a next-occurrence function.
    ///
    /// The function receives a reference time and returns the next time at
    /// which the job should run, or `None` when no further occurrences
    /// exist.
    pub fn new<F>(next_occurrence: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> Option<DateTime<Utc>> + Send + Sync + 'static,
    {
        Self {
            next_occurrence: Arc::new(next_occurrence),
            clock: Arc::new(SystemClock),
            end_time: None,
        }
    }

    /// Create a schedule from a crontab expression.
    ///
    /// Accepts the extended format understood by the `cron` crate,
    /// including a seconds field (e.g. `"*/5 * * * * *"`).
    pub fn cron(expression: &str) -> Result<Self, JobError> {
        let schedule = cron::Schedule::from_str(expression).map_err(|err| {
            JobError::Configuration(format!("invalid cron expression '{expression}': {err}"))
        })?;
        Ok(Self::new(move |after| schedule.after(&after).next()))
    }

    /// Replace the time source. Defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound the schedule by an inclusive end time.
    ///
    /// Occurrences past the bound collapse to exactly the end time, which
    /// makes the bound itself a final, reachable tick rather than a hard
    /// cutoff that silently drops the last occurrence.
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// The schedule's time source.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The inclusive upper bound, if any.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// The next time at which the job should run, relative to the clock's
    /// current time.
    ///
    /// Once the clock has reached the end time every call returns exactly
    /// the end time. Returns `None` when the occurrence function is
    /// exhausted.
    pub fn next_scheduled_time(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        if let Some(end) = self.end_time {
            if now >= end {
                return Some(end);
            }
            return (self.next_occurrence)(now).map(|next| next.min(end));
        }
        (self.next_occurrence)(now)
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("end_time", &self.end_time)
            .finish_non_exhaustive()
    }
}
