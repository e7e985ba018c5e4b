//! # Gather Core
//!
//! Domain types and ports for the Gather event service.
//!
//! This crate contains no I/O. It defines:
//!
//! - **Types**: events, users, filters, patches and the validated creation payload
//! - **Errors**: the taxonomy every layer reports in
//! - **Ports**: the traits the service talks through ([`event_store::EventStore`],
//!   [`directory::UserDirectory`], [`delivery::DeliveryChannel`], [`environment::Clock`])
//! - **Notifications**: rendering of the message a user receives
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Dependency Injection via `Arc<dyn Port>`
//! - Invariants live next to the data they protect
//!
//! ## Example
//!
//! ```
//! use gather_core::types::{AttendeeList, EventDraft};
//!
//! let draft = EventDraft {
//!     title: Some("RustConf".to_string()),
//!     description: Some("Annual conference".to_string()),
//!     date: Some("2026-09-10".to_string()),
//!     location: Some("Montreal".to_string()),
//!     max_attendees: Some(2),
//!     attendees: Some(AttendeeList::Joined("u1, u2, u1".to_string())),
//!     image: None,
//! };
//!
//! let event = draft.validate().unwrap();
//! assert_eq!(event.attendees.len(), 2);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod delivery;
pub mod directory;
pub mod error;
pub mod event_store;
pub mod notification;
pub mod types;

pub use error::{DirectoryError, DispatchError, EventError, StoreError, ValidationErrors};
pub use notification::{Notification, NotificationKind};
pub use types::{Event, EventFilter, EventId, EventPatch, EventQuery, ImageRef, NewEvent, User, UserId};

/// Environment module - time as an injected dependency
///
/// Anything that asks "what time is it" (timestamps on writes, the reminder
/// scheduler) goes through [`Clock`](environment::Clock) so tests can pin or
/// advance time instead of waiting on the wall clock.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use gather_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
