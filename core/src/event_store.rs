//! Event store trait and related types.
//!
//! This module defines the storage abstraction for [`Event`] records: keyed
//! lookup, filtered queries, creation, deletion, and one write primitive for
//! every modification, [`EventStore::conditional_update`].
//!
//! # Design
//!
//! All modifications go through a conditional update: a list of
//! [`Precondition`]s evaluated against the latest stored state and a
//! [`Mutation`] applied only if they all hold, as one atomic step per event id.
//! This is what keeps the RSVP invariants intact under concurrency:
//!
//! ```text
//! RSVP(u) = conditional_update(id, [NotAttending(u), HasCapacity], AppendAttendee(u))
//!
//! Two racing RSVPs for the last seat:
//!   A: lock(id) → check ok → append → unlock      → Applied
//!   B:        lock(id) ....................→ check: HasCapacity fails → Rejected
//! ```
//!
//! Updates on different ids never contend with each other.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (in `gather-postgres`): row lock inside a transaction
//! - `InMemoryEventStore` (in `gather-testing`): one lock per event
//!
//! # Example
//!
//! ```no_run
//! use gather_core::event_store::{EventStore, Mutation, Precondition, UpdateOutcome};
//! use gather_core::{EventId, StoreError, UserId};
//!
//! async fn rsvp(store: &dyn EventStore, id: EventId, user: UserId) -> Result<(), StoreError> {
//!     let outcome = store
//!         .conditional_update(
//!             id,
//!             vec![Precondition::NotAttending(user.clone()), Precondition::HasCapacity],
//!             Mutation::AppendAttendee(user),
//!         )
//!         .await?;
//!
//!     match outcome {
//!         UpdateOutcome::Applied(event) => println!("{} attendees", event.attendee_count()),
//!         UpdateOutcome::Rejected { failed, .. } => println!("rejected: {failed:?}"),
//!         UpdateOutcome::NotFound => println!("no such event"),
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::StoreError;
use crate::types::{Event, EventId, EventPatch, EventQuery, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A condition over the current state of an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// The user is not registered yet.
    NotAttending(UserId),
    /// At least one seat is left.
    HasCapacity,
}

impl Precondition {
    /// Evaluate against `event`.
    #[must_use]
    pub fn check(&self, event: &Event) -> bool {
        match self {
            Self::NotAttending(user_id) => !event.has_attendee(user_id),
            Self::HasCapacity => !event.is_full(),
        }
    }

    /// First precondition in `preconditions` that does not hold, if any.
    #[must_use]
    pub fn first_failing<'a>(preconditions: &'a [Self], event: &Event) -> Option<&'a Self> {
        preconditions.iter().find(|p| !p.check(event))
    }
}

/// A modification of an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Register a user (appended, so RSVP order is kept).
    AppendAttendee(UserId),
    /// Overwrite the fields present in the patch.
    Apply(EventPatch),
}

impl Mutation {
    /// Apply to `event`, stamping `updated_at` with `now`.
    pub fn apply(self, event: &mut Event, now: DateTime<Utc>) {
        match self {
            Self::AppendAttendee(user_id) => event.attendees.push(user_id),
            Self::Apply(patch) => patch.apply_to(event),
        }
        event.updated_at = now;
    }
}

/// Result of a conditional update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// All preconditions held; the mutation was persisted.
    Applied(Event),
    /// A precondition failed; nothing was written.
    Rejected {
        /// The first precondition that did not hold.
        failed: Precondition,
        /// The state it was evaluated against.
        current: Event,
    },
    /// No event with that id.
    NotFound,
}

/// Storage abstraction for events.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across request handlers
/// and the reminder scheduler.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures instead of using `async fn` so the store can
/// be held as `Arc<dyn EventStore>`.
pub trait EventStore: Send + Sync {
    /// Events matching every criterion of `query`, ascending by date.
    ///
    /// # Errors
    ///
    /// - `Database` / `Unavailable`: the query could not run
    /// - `Serialization`: a stored record could not be decoded
    fn find<'a>(&'a self, query: &'a EventQuery) -> StoreFuture<'a, Vec<Event>>;

    /// The event with `id`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    fn find_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// Persist a new event.
    ///
    /// # Errors
    ///
    /// - `Database`: the insert failed (including a duplicate id)
    fn create(&self, event: Event) -> StoreFuture<'_, Event>;

    /// Atomically evaluate `preconditions` against the latest state of `id`
    /// and apply `mutation` if they all hold.
    ///
    /// Evaluation and write form a single unit with respect to every other
    /// conditional update on the same id. An event deleted concurrently is
    /// reported as [`UpdateOutcome::NotFound`], never as applied.
    ///
    /// # Errors
    ///
    /// - `Database` / `Unavailable`: the transaction could not complete
    fn conditional_update(
        &self,
        id: EventId,
        preconditions: Vec<Precondition>,
        mutation: Mutation,
    ) -> StoreFuture<'_, UpdateOutcome>;

    /// Remove the event. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// - `Database` / `Unavailable`: the delete could not run
    fn delete_by_id(&self, id: EventId) -> StoreFuture<'_, bool>;
}
