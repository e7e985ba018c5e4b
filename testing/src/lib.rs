//! # Gather Testing
//!
//! Testing utilities for the Gather event service.
//!
//! This crate provides:
//! - [`ManualClock`]: deterministic, advanceable time
//! - [`InMemoryEventStore`]: `EventStore` with one lock per event
//! - [`InMemoryUserDirectory`]: `UserDirectory` backed by a map
//! - [`RecordingChannel`]: `DeliveryChannel` that records sends and can fail or
//!   stall chosen recipients
//! - [`fixtures`]: builders for events and users
//!
//! ## Example
//!
//! ```
//! use gather_testing::{InMemoryEventStore, fixtures::EventFixture};
//! use gather_core::event_store::EventStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryEventStore::new();
//! let event = store.create(EventFixture::new("Meetup").max_attendees(2).build()).await?;
//! assert!(store.find_by_id(event.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_panics_doc)] // Test utilities panic only on poisoned locks

pub mod channel;
pub mod directory;
pub mod fixtures;
pub mod store;

pub use channel::RecordingChannel;
pub use directory::InMemoryUserDirectory;
pub use mocks::{ManualClock, test_clock};
pub use store::InMemoryEventStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use gather_core::environment::Clock;
    use std::sync::{Arc, Mutex};

    /// Manually driven clock for deterministic tests
    ///
    /// Returns the same time until it is [`set`](Self::set) or
    /// [`advance`](Self::advance)d. Clones share the same time, so a test can
    /// keep one handle and move time under a component holding another.
    ///
    /// # Example
    ///
    /// ```
    /// use gather_testing::mocks::ManualClock;
    /// use gather_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let start = clock.now();
    /// clock.advance(Duration::days(1));
    /// assert_eq!(clock.now() - start, Duration::days(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock showing `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }

        /// Move forward by `by`
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> ManualClock {
        ManualClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}
