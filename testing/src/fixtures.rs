//! Builders for test data.

#![allow(clippy::expect_used)] // Fixture dates are literals

use chrono::{DateTime, Utc};
use gather_core::types::parse_event_date;
use gather_core::{Event, EventId, User, UserId};

/// Builder for [`Event`] values with sensible defaults.
///
/// Defaults: date 2026-01-15 18:00 UTC, ten seats, no attendees.
#[derive(Debug, Clone)]
pub struct EventFixture {
    event: Event,
}

impl EventFixture {
    /// Start an event called `title`
    #[must_use]
    pub fn new(title: &str) -> Self {
        let date = parse_event_date("2026-01-15T18:00:00Z").expect("fixture date parses");
        Self {
            event: Event {
                id: EventId::new(),
                title: title.to_string(),
                description: format!("{title} description"),
                date,
                location: "Main Hall".to_string(),
                max_attendees: 10,
                attendees: Vec::new(),
                image: None,
                created_at: date,
                updated_at: date,
            },
        }
    }

    /// Set the cap
    #[must_use]
    pub fn max_attendees(mut self, max: u32) -> Self {
        self.event.max_attendees = max;
        self
    }

    /// Set the attendees, in order
    #[must_use]
    pub fn attendees(mut self, ids: &[&str]) -> Self {
        self.event.attendees = ids.iter().copied().map(UserId::from).collect();
        self
    }

    /// Set the date from `YYYY-MM-DD` or RFC 3339
    #[must_use]
    pub fn on(mut self, date: &str) -> Self {
        self.event.date = parse_event_date(date).expect("fixture date parses");
        self
    }

    /// Set the date
    #[must_use]
    pub fn at(mut self, date: DateTime<Utc>) -> Self {
        self.event.date = date;
        self
    }

    /// Set the location
    #[must_use]
    pub fn location(mut self, location: &str) -> Self {
        self.event.location = location.to_string();
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> Event {
        self.event
    }
}

/// A user whose email is `{id}@example.com` and name is `User {id}`
#[must_use]
pub fn user(id: &str) -> User {
    User {
        id: UserId::from(id),
        email: format!("{id}@example.com"),
        display_name: format!("User {id}"),
    }
}

/// A user with an explicit email address
#[must_use]
pub fn user_with_email(id: &str, email: &str) -> User {
    User {
        id: UserId::from(id),
        email: email.to_string(),
        display_name: format!("User {id}"),
    }
}
