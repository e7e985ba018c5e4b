//! Notification fan-out.
//!
//! The dispatcher resolves attendees to users, renders one message per user,
//! and sends them all concurrently. Each send is independent and bounded by a
//! per-recipient timeout. Failures are logged and counted in the returned
//! [`DispatchReport`]; nothing is ever propagated to the caller.

use crate::metrics;
use futures::future::join_all;
use gather_core::delivery::DeliveryChannel;
use gather_core::directory::UserDirectory;
use gather_core::{DispatchError, Event, Notification, NotificationKind, User, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-recipient send timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sends started (one per resolved, distinct user)
    pub attempted: usize,
    /// Sends the channel accepted
    pub delivered: usize,
    /// Sends that errored or timed out
    pub failed: usize,
    /// Attendee ids the directory did not resolve
    pub unresolved: usize,
}

impl DispatchReport {
    fn unresolved(count: usize) -> Self {
        Self {
            unresolved: count,
            ..Self::default()
        }
    }
}

/// Delivers notifications about an event to its attendees.
#[derive(Clone)]
pub struct NotificationDispatcher {
    directory: Arc<dyn UserDirectory>,
    channel: Arc<dyn DeliveryChannel>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the default per-recipient timeout.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, channel: Arc<dyn DeliveryChannel>) -> Self {
        Self {
            directory,
            channel,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-recipient timeout.
    #[must_use]
    pub const fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Notify every current attendee of `event`.
    ///
    /// Each distinct attendee receives at most one message per call.
    pub async fn notify(&self, event: &Event, kind: NotificationKind) -> DispatchReport {
        self.fan_out(event, &event.attendees, kind).await
    }

    /// Notify a single user about `event`.
    pub async fn notify_user(
        &self,
        event: &Event,
        user_id: &UserId,
        kind: NotificationKind,
    ) -> DispatchReport {
        self.fan_out(event, std::slice::from_ref(user_id), kind).await
    }

    #[tracing::instrument(
        skip(self, event, ids),
        fields(event_id = %event.id, kind = %kind, attendees = ids.len())
    )]
    async fn fan_out(&self, event: &Event, ids: &[UserId], kind: NotificationKind) -> DispatchReport {
        if ids.is_empty() {
            tracing::debug!("No recipients, nothing to send");
            return DispatchReport::default();
        }

        let started = Instant::now();

        let users = match self.directory.find_users(ids).await {
            Ok(users) => users,
            Err(e) => {
                let e = DispatchError::from(e);
                tracing::error!(error = %e, "Could not resolve recipients, skipping dispatch");
                metrics::record_notifications(kind.as_str(), "unresolved", ids.len());
                return DispatchReport::unresolved(ids.len());
            }
        };

        let recipients = distinct_recipients(ids, users);
        let unresolved = ids
            .iter()
            .collect::<HashSet<_>>()
            .len()
            .saturating_sub(recipients.len());
        if unresolved > 0 {
            tracing::warn!(unresolved, "Some attendees are unknown to the directory");
        }

        let sends = recipients.iter().map(|user| self.send_one(kind, event, user));
        let results = join_all(sends).await;

        let delivered = results.iter().filter(|r| r.is_ok()).count();
        let timed_out = results
            .iter()
            .filter(|r| matches!(r, Err(DispatchError::Timeout { .. })))
            .count();
        let failed = results.len() - delivered;

        metrics::record_notifications(kind.as_str(), "delivered", delivered);
        metrics::record_notifications(kind.as_str(), "failed", failed - timed_out);
        metrics::record_notifications(kind.as_str(), "timeout", timed_out);
        metrics::record_notifications(kind.as_str(), "unresolved", unresolved);
        metrics::record_dispatch_duration(started.elapsed());

        let report = DispatchReport {
            attempted: results.len(),
            delivered,
            failed,
            unresolved,
        };
        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            unresolved = report.unresolved,
            "Dispatch complete"
        );
        report
    }

    async fn send_one(
        &self,
        kind: NotificationKind,
        event: &Event,
        user: &User,
    ) -> Result<(), DispatchError> {
        let notification = Notification::render(kind, event, user);
        let recipient = notification.recipient.clone();

        let result = match tokio::time::timeout(self.send_timeout, self.channel.send(notification)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout {
                address: recipient.clone(),
                timeout_ms: u64::try_from(self.send_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match &result {
            Ok(()) => tracing::debug!(%recipient, user_id = %user.id, "Notification delivered"),
            Err(e) => tracing::warn!(%recipient, user_id = %user.id, error = %e, "Notification failed"),
        }
        result
    }
}

/// Resolved users in attendee order, each user at most once.
fn distinct_recipients(ids: &[UserId], users: Vec<User>) -> Vec<User> {
    let mut by_id: HashMap<UserId, User> =
        users.into_iter().map(|u| (u.id.clone(), u)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
