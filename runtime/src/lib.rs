//! # Gather Runtime
//!
//! The moving parts of the Gather event service that run outside a request:
//!
//! - **Dispatcher** ([`dispatcher::NotificationDispatcher`]): best-effort fan-out
//!   of one notification to many recipients, with a per-recipient timeout
//! - **Queue** ([`queue::DispatchQueue`]): fire-and-forget hand-off so request
//!   latency never depends on delivery latency
//! - **Scheduler** ([`scheduler::ReminderScheduler`]): daily day-before reminders
//!   driven by an injected clock
//! - **Retry** and **Metrics** support
//!
//! ## Example
//!
//! ```no_run
//! use gather_runtime::dispatcher::NotificationDispatcher;
//! use gather_runtime::queue::{DispatchJob, DispatchQueue};
//! use gather_core::delivery::DeliveryChannel;
//! use gather_core::directory::UserDirectory;
//! use gather_core::{Event, NotificationKind};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     event: Event,
//! #     directory: Arc<dyn UserDirectory>,
//! #     channel: Arc<dyn DeliveryChannel>,
//! # ) {
//! let queue = DispatchQueue::start(NotificationDispatcher::new(directory, channel), 1024);
//!
//! // Returns immediately; delivery happens on a background task
//! queue.enqueue(DispatchJob::attendees(event, NotificationKind::Updated));
//! # }
//! ```

/// Notification fan-out
pub mod dispatcher;

/// Prometheus metrics for observability
pub mod metrics;

/// Fire-and-forget dispatch queue
pub mod queue;

/// Retry logic with exponential backoff
pub mod retry;

/// Daily reminder scheduling
pub mod scheduler;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use queue::{DispatchJob, DispatchQueue, QueueError};
pub use scheduler::{DailySchedule, ReminderRun, ReminderScheduler, reminder_window};
