//! Error taxonomy shared by every layer of the service.
//!
//! Errors are grouped by who can act on them:
//!
//! - [`ValidationErrors`]: the caller sent something incomplete or malformed
//! - [`EventError`]: what an Event Service operation reports to its caller
//! - [`StoreError`]: the backing store failed (transient, server side)
//! - [`DirectoryError`] / [`DispatchError`]: notification problems, which are
//!   logged at the dispatcher boundary and never reach the triggering caller

use crate::types::{EventId, UserId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field as it appears in the request payload.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

/// Every validation problem found in one payload.
///
/// Validation collects all problems before failing so the caller can fix the
/// whole request in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Create an error set holding a single problem.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a problem with `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether no problem was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded problems, in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether a problem was recorded for `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one problem was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors reported by Event Service operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Missing or malformed input.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// The referenced event does not exist.
    #[error("Event {0} not found")]
    NotFound(EventId),

    /// The user is already registered for the event.
    #[error("User {user_id} has already RSVP'd for event {event_id}")]
    DuplicateRsvp {
        /// Event the RSVP targeted.
        event_id: EventId,
        /// User that tried to register twice.
        user_id: UserId,
    },

    /// The event reached its attendee cap.
    #[error("Event {event_id} is full ({max_attendees} attendees)")]
    EventFull {
        /// Event the RSVP targeted.
        event_id: EventId,
        /// The cap that was reached.
        max_attendees: u32,
    },

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Errors that can occur during event store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database query or connection failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back into an [`Event`](crate::Event).
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store is not reachable right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether repeating the same read may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }
}

/// Errors from the user directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The lookup failed.
    #[error("User lookup failed: {0}")]
    Lookup(String),
}

/// Per-recipient notification failures.
///
/// These are swallowed by the dispatcher: logged and counted, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The recipient address could not be parsed.
    #[error("Invalid recipient address {address}: {reason}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The delivery channel rejected or failed to deliver the message.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The send did not complete within the per-recipient timeout.
    #[error("Delivery to {address} timed out after {timeout_ms}ms")]
    Timeout {
        /// Recipient whose send timed out.
        address: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// Attendees could not be resolved to users.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}
