//! Fire-and-forget hand-off between request handlers and the dispatcher.
//!
//! Request handlers call [`DispatchQueue::enqueue`], which never waits on
//! delivery: the job goes into a bounded channel and a background worker spawns
//! one task per job. A full queue drops the job with a warning rather than
//! slowing the caller down.
//!
//! ```text
//! handler ──try_send──▶ [bounded mpsc] ──▶ worker ──spawn──▶ dispatcher.notify(..)
//!                                                 ──spawn──▶ dispatcher.notify_user(..)
//! ```

use crate::dispatcher::{DispatchReport, NotificationDispatcher};
use crate::metrics;
use gather_core::{Event, NotificationKind, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::{JoinHandle, JoinSet};

/// Default number of jobs the queue buffers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Who a job is addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every current attendee of the event
    Attendees,
    /// One user
    User(UserId),
}

/// A unit of notification work.
#[derive(Clone, Debug)]
pub struct DispatchJob {
    /// Event snapshot the message is rendered from
    pub event: Event,
    /// Why the message is sent
    pub kind: NotificationKind,
    /// Recipients
    pub audience: Audience,
}

impl DispatchJob {
    /// Notify all attendees of `event`.
    #[must_use]
    pub const fn attendees(event: Event, kind: NotificationKind) -> Self {
        Self {
            event,
            kind,
            audience: Audience::Attendees,
        }
    }

    /// Notify `user_id` about `event`.
    #[must_use]
    pub const fn user(event: Event, user_id: UserId, kind: NotificationKind) -> Self {
        Self {
            event,
            kind,
            audience: Audience::User(user_id),
        }
    }

    async fn run(self, dispatcher: &NotificationDispatcher) -> DispatchReport {
        match &self.audience {
            Audience::Attendees => dispatcher.notify(&self.event, self.kind).await,
            Audience::User(user_id) => dispatcher.notify_user(&self.event, user_id, self.kind).await,
        }
    }
}

/// Errors from queue lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Jobs were still running when the shutdown timeout elapsed.
    #[error("Dispatch queue shutdown timed out with {0} jobs still pending")]
    ShutdownTimeout(usize),
}

/// Bounded, non-blocking notification queue.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::Sender<DispatchJob>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Count of accepted-but-unfinished jobs, with a wake-up when it reaches zero.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn acquire(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl DispatchQueue {
    /// Start a queue and its worker on the current Tokio runtime.
    #[must_use]
    pub fn start(dispatcher: NotificationDispatcher, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pending = Arc::new(Pending::default());
        let worker = tokio::spawn(run_worker(dispatcher, receiver, Arc::clone(&pending)));

        tracing::info!(capacity, "Dispatch queue started");
        Self {
            sender,
            pending,
            closed: Arc::new(AtomicBool::new(false)),
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Hand `job` to the worker without waiting for delivery.
    ///
    /// Returns `false` if the job was dropped because the queue is full or
    /// shutting down.
    pub fn enqueue(&self, job: DispatchJob) -> bool {
        // Count the job before looking at `closed`: a concurrent shutdown
        // either sees it pending or this call sees the queue closed.
        self.pending.acquire();
        if self.closed.load(Ordering::SeqCst) {
            self.pending.release();
            tracing::warn!(event_id = %job.event.id, kind = %job.kind, "Dispatch queue closed, dropping job");
            metrics::record_queue_rejected();
            return false;
        }

        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(err) => {
                self.pending.release();
                let job = match err {
                    mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) => job,
                };
                tracing::warn!(event_id = %job.event.id, kind = %job.kind, "Dispatch queue full, dropping job");
                metrics::record_queue_rejected();
                false
            }
        }
    }

    /// Jobs enqueued but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Wait until every job enqueued so far has finished.
    pub async fn flush(&self) {
        loop {
            let idle = self.pending.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Stop accepting jobs, wait for in-flight ones, then stop the worker.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ShutdownTimeout`] if jobs are still running when
    /// `timeout` elapses; the worker and every job it started are aborted in
    /// that case.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), QueueError> {
        tracing::info!("Shutting down dispatch queue");
        self.closed.store(true, Ordering::SeqCst);

        let drained = tokio::time::timeout(timeout, self.flush()).await.is_ok();

        // Dropping the worker's JoinSet aborts the job tasks still running.
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
            let _ = worker.await;
        }

        if drained {
            tracing::info!("Dispatch queue drained");
            Ok(())
        } else {
            let pending = self.pending();
            tracing::error!(pending, "Dispatch queue shutdown timed out");
            Err(QueueError::ShutdownTimeout(pending))
        }
    }
}

async fn run_worker(
    dispatcher: NotificationDispatcher,
    mut receiver: mpsc::Receiver<DispatchJob>,
    pending: Arc<Pending>,
) {
    let mut jobs = JoinSet::new();
    loop {
        tokio::select! {
            job = receiver.recv() => {
                let Some(job) = job else { break };
                let dispatcher = dispatcher.clone();
                let pending = Arc::clone(&pending);
                jobs.spawn(async move {
                    job.run(&dispatcher).await;
                    pending.release();
                });
            }
            Some(finished) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Dispatch job failed");
                }
            }
        }
    }
    while let Some(finished) = jobs.join_next().await {
        if let Err(e) = finished {
            tracing::error!(error = %e, "Dispatch job failed");
        }
    }
    tracing::debug!("Dispatch worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gather_testing::fixtures::{EventFixture, user};
    use gather_testing::{InMemoryUserDirectory, RecordingChannel};
    use std::time::Instant;

    fn queue_with(channel: &RecordingChannel, capacity: usize) -> DispatchQueue {
        let directory = InMemoryUserDirectory::new()
            .with_user(user("u1"))
            .with_user(user("u2"));
        let dispatcher = NotificationDispatcher::new(Arc::new(directory), Arc::new(channel.clone()));
        DispatchQueue::start(dispatcher, capacity)
    }

    #[tokio::test]
    async fn test_enqueue_then_flush_delivers() {
        let channel = RecordingChannel::new();
        let queue = queue_with(&channel, 8);
        let event = EventFixture::new("Launch").attendees(&["u1", "u2"]).build();

        assert!(queue.enqueue(DispatchJob::attendees(event.clone(), NotificationKind::Updated)));
        assert!(queue.enqueue(DispatchJob::user(event, UserId::from("u1"), NotificationKind::RsvpConfirmed)));
        queue.flush().await;

        assert_eq!(channel.sent().len(), 3);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_does_not_wait_for_slow_delivery() {
        let channel = RecordingChannel::new().delayed_for("u1@example.com", Duration::from_millis(200));
        let queue = queue_with(&channel, 8);
        let event = EventFixture::new("Launch").attendees(&["u1"]).build();

        let start = Instant::now();
        assert!(queue.enqueue(DispatchJob::attendees(event, NotificationKind::Updated)));
        assert!(start.elapsed() < Duration::from_millis(100));

        queue.flush().await;
        assert_eq!(channel.recipients(), vec!["u1@example.com"]);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_jobs() {
        let channel = RecordingChannel::new();
        let queue = queue_with(&channel, 8);
        let event = EventFixture::new("Launch").attendees(&["u1"]).build();

        queue.shutdown(Duration::from_secs(1)).await.unwrap();

        assert!(!queue.enqueue(DispatchJob::attendees(event, NotificationKind::Updated)));
        assert!(channel.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_times_out_on_stuck_jobs() {
        let channel = RecordingChannel::new().delayed_for("u1@example.com", Duration::from_secs(30));
        let queue = queue_with(&channel, 8);
        let event = EventFixture::new("Launch").attendees(&["u1"]).build();

        assert!(queue.enqueue(DispatchJob::attendees(event, NotificationKind::Updated)));
        let result = queue.shutdown(Duration::from_millis(50)).await;

        assert_eq!(result, Err(QueueError::ShutdownTimeout(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_aborts_running_jobs() {
        let channel = RecordingChannel::new().delayed_for("u1@example.com", Duration::from_secs(30));
        let directory = InMemoryUserDirectory::new().with_user(user("u1"));
        let dispatcher = NotificationDispatcher::new(Arc::new(directory), Arc::new(channel.clone()))
            .with_send_timeout(Duration::from_secs(120));
        let queue = DispatchQueue::start(dispatcher, 8);
        let event = EventFixture::new("Launch").attendees(&["u1"]).build();

        assert!(queue.enqueue(DispatchJob::attendees(event, NotificationKind::Updated)));
        assert!(queue.shutdown(Duration::from_secs(1)).await.is_err());

        // Left running, the stalled send would complete at the 30s mark.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(channel.attempts(), vec!["u1@example.com"]);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_accepted_during_shutdown_are_delivered() {
        let channel = RecordingChannel::new();
        let queue = queue_with(&channel, 1024);
        let event = EventFixture::new("Launch").attendees(&["u1"]).build();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                let event = event.clone();
                tokio::spawn(async move {
                    let mut accepted = 0;
                    for _ in 0..50 {
                        if queue.enqueue(DispatchJob::attendees(event.clone(), NotificationKind::Updated)) {
                            accepted += 1;
                        }
                        tokio::task::yield_now().await;
                    }
                    accepted
                })
            })
            .collect();

        tokio::task::yield_now().await;
        queue.shutdown(Duration::from_secs(5)).await.unwrap();

        let mut accepted = 0;
        for producer in producers {
            accepted += producer.await.unwrap();
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(channel.sent().len(), accepted);
    }
}
