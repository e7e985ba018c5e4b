//! Daily reminder scheduler.
//!
//! Once a day, at a fixed UTC wall-clock time, the scheduler looks up every
//! event taking place on the next calendar day and sends its attendees a
//! reminder. Time comes from an injected [`Clock`], so tests drive firings
//! directly through [`ReminderScheduler::fire`] or move a manual clock.
//!
//! A firing matches events by calendar day, not by instant: firing at
//! `2026-03-09T08:00Z` reminds every event dated within
//! `[2026-03-10T00:00Z, 2026-03-11T00:00Z)`.

use crate::dispatcher::NotificationDispatcher;
use crate::metrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use gather_core::environment::Clock;
use gather_core::event_store::EventStore;
use gather_core::{EventQuery, NotificationKind, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How late a firing may start before it is skipped, in seconds.
pub const DEFAULT_MAX_LATENESS_SECS: i64 = 3600;

/// A fixed time of day, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySchedule {
    /// Time of day of each firing
    pub at: NaiveTime,
}

impl DailySchedule {
    /// Fire every day at `at` UTC.
    #[must_use]
    pub const fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// The first firing strictly after `instant`.
    #[must_use]
    pub fn next_after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let today = instant.date_naive().and_time(self.at).and_utc();
        if today > instant {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }
}

impl Default for DailySchedule {
    /// 08:00 UTC
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default())
    }
}

/// The calendar day after `fired_at`, as a half-open UTC range.
#[must_use]
pub fn reminder_window(fired_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tomorrow = fired_at.date_naive() + ChronoDuration::days(1);
    let start = tomorrow.and_time(NaiveTime::default()).and_utc();
    (start, start + ChronoDuration::days(1))
}

/// Summary of one firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReminderRun {
    /// When the firing happened
    pub fired_at: DateTime<Utc>,
    /// Start of the matched day
    pub window_start: DateTime<Utc>,
    /// Events found in the window
    pub events: usize,
    /// Reminders delivered across all events
    pub delivered: usize,
    /// Reminders that failed across all events
    pub failed: usize,
}

/// Sends day-before reminders.
pub struct ReminderScheduler {
    store: Arc<dyn EventStore>,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    schedule: DailySchedule,
    retry: RetryPolicy,
    max_lateness: ChronoDuration,
}

impl ReminderScheduler {
    /// Create a scheduler firing daily at 08:00 UTC.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            schedule: DailySchedule::default(),
            retry: RetryPolicy::default(),
            max_lateness: ChronoDuration::seconds(DEFAULT_MAX_LATENESS_SECS),
        }
    }

    /// Use `schedule` instead of the default.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: DailySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Use `retry` for the store query.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Skip a firing whose wake-up comes more than `max_lateness` after its
    /// scheduled time (host suspend, stalled runtime).
    #[must_use]
    pub const fn with_max_lateness(mut self, max_lateness: ChronoDuration) -> Self {
        self.max_lateness = max_lateness;
        self
    }

    /// Run one firing as of `fired_at`.
    ///
    /// Each event in the window is dispatched once. Delivery failures are
    /// counted in the result, never returned.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query still fails after retries.
    #[tracing::instrument(skip_all, fields(fired_at = %fired_at))]
    pub async fn fire(&self, fired_at: DateTime<Utc>) -> Result<ReminderRun, StoreError> {
        let (start, end) = reminder_window(fired_at);
        let query = EventQuery::between(start, end);

        let events = retry_with_predicate(
            &self.retry,
            || self.store.find(&query),
            StoreError::is_transient,
        )
        .await?;

        let mut run = ReminderRun {
            fired_at,
            window_start: start,
            events: events.len(),
            delivered: 0,
            failed: 0,
        };

        for event in &events {
            let report = self.dispatcher.notify(event, NotificationKind::Reminder).await;
            run.delivered += report.delivered;
            run.failed += report.failed;
        }

        tracing::info!(
            events = run.events,
            delivered = run.delivered,
            failed = run.failed,
            "Reminder firing complete"
        );
        Ok(run)
    }

    /// Fire at every scheduled time until `shutdown` turns true.
    ///
    /// A failed firing is logged and counted; the loop always continues to the
    /// next scheduled time. A firing that wakes up too late is skipped rather
    /// than run against a day that has already begun.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(at = %self.schedule.at, "Reminder scheduler started");
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = self.clock.now();
            let from = last_fired.map_or(now, |last| last.max(now));
            let next = self.schedule.next_after(from);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(next = %next, wait_secs = wait.as_secs(), "Next reminder firing scheduled");

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            last_fired = Some(next);
            let lateness = self.clock.now() - next;
            if lateness > self.max_lateness {
                metrics::record_reminder_run("skipped");
                tracing::warn!(
                    scheduled = %next,
                    late_by_secs = lateness.num_seconds(),
                    "Reminder firing skipped, woke up too late"
                );
                continue;
            }
            match self.fire(next).await {
                Ok(_) => metrics::record_reminder_run("ok"),
                Err(e) => {
                    metrics::record_reminder_run("error");
                    tracing::error!(error = %e, fired_at = %next, "Reminder firing failed");
                }
            }
        }

        tracing::info!("Reminder scheduler stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_after_same_day_and_rollover() {
        let schedule = DailySchedule::default();

        assert_eq!(schedule.next_after(at(2026, 3, 9, 7, 59)), at(2026, 3, 9, 8, 0));
        assert_eq!(schedule.next_after(at(2026, 3, 9, 8, 0)), at(2026, 3, 10, 8, 0));
        assert_eq!(schedule.next_after(at(2026, 12, 31, 23, 0)), at(2027, 1, 1, 8, 0));
    }

    #[test]
    fn test_reminder_window_is_next_calendar_day() {
        let (start, end) = reminder_window(at(2026, 3, 9, 8, 0));
        assert_eq!(start, at(2026, 3, 10, 0, 0));
        assert_eq!(end, at(2026, 3, 11, 0, 0));

        // Late firing still targets the next calendar day
        let (start, _) = reminder_window(at(2026, 3, 9, 23, 59));
        assert_eq!(start, at(2026, 3, 10, 0, 0));
    }
}
