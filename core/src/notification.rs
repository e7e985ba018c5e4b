//! Notification messages.
//!
//! A [`Notification`] is an ephemeral value: rendered for one recipient, handed
//! to a [`DeliveryChannel`](crate::delivery::DeliveryChannel), then dropped.

use crate::types::{Event, User};
use serde::Serialize;
use std::fmt;

/// Why a notification is being sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The event's details were edited.
    Updated,
    /// The event starts tomorrow.
    Reminder,
    /// The recipient's RSVP was accepted.
    RsvpConfirmed,
}

impl NotificationKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Reminder => "reminder",
            Self::RsvpConfirmed => "rsvp_confirmed",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message addressed to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Recipient email address
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

impl Notification {
    /// Render the message `user` receives about `event`.
    #[must_use]
    pub fn render(kind: NotificationKind, event: &Event, user: &User) -> Self {
        let (subject, headline) = match kind {
            NotificationKind::Updated => (
                format!("Event Notification: {}", event.title),
                format!("The event \"{}\" has been updated.", event.title),
            ),
            NotificationKind::Reminder => (
                format!("Event Reminder: {}", event.title),
                format!("This is a reminder that \"{}\" takes place tomorrow.", event.title),
            ),
            NotificationKind::RsvpConfirmed => (
                format!("RSVP Confirmed: {}", event.title),
                format!("You're on the list for \"{}\".", event.title),
            ),
        };

        let body = format!(
            "Dear {name},\n\n{headline} Here are the details:\n\n\
             Description: {description}\n\
             Date: {date}\n\
             Location: {location}\n\n\
             Best regards,\nThe Gather Team",
            name = user.display_name,
            description = event.description,
            date = event.date.format("%A, %B %-d, %Y at %H:%M UTC"),
            location = event.location,
        );

        Self {
            recipient: user.email.clone(),
            subject,
            body,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventId, UserId, parse_event_date};

    fn sample() -> (Event, User) {
        let date = parse_event_date("2026-11-02T18:30:00Z").unwrap();
        let event = Event {
            id: EventId::new(),
            title: "Rust Meetup".to_string(),
            description: "Talks and pizza".to_string(),
            date,
            location: "Berlin".to_string(),
            max_attendees: 10,
            attendees: vec![UserId::from("u1")],
            image: None,
            created_at: date,
            updated_at: date,
        };
        let user = User {
            id: UserId::from("u1"),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
        };
        (event, user)
    }

    #[test]
    fn test_update_message_embeds_event_details() {
        let (event, user) = sample();
        let message = Notification::render(NotificationKind::Updated, &event, &user);

        assert_eq!(message.recipient, "ada@example.com");
        assert_eq!(message.subject, "Event Notification: Rust Meetup");
        assert!(message.body.starts_with("Dear Ada,"));
        assert!(message.body.contains("Description: Talks and pizza"));
        assert!(message.body.contains("Date: Monday, November 2, 2026 at 18:30 UTC"));
        assert!(message.body.contains("Location: Berlin"));
    }

    #[test]
    fn test_reminder_subject() {
        let (event, user) = sample();
        let message = Notification::render(NotificationKind::Reminder, &event, &user);
        assert_eq!(message.subject, "Event Reminder: Rust Meetup");
        assert!(message.body.contains("takes place tomorrow"));
    }
}
