//! In-memory event store.
//!
//! Each event lives in its own slot guarded by its own async mutex. A
//! conditional update locks only the slot of the event it targets, so updates
//! to one event are serialized while updates to different events run freely.
//! The map of slots is behind a short-lived `RwLock` that is never held across
//! an `.await`.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap on lock poisoning

use gather_core::StoreError;
use gather_core::environment::{Clock, SystemClock};
use gather_core::event_store::{EventStore, Mutation, Precondition, StoreFuture, UpdateOutcome};
use gather_core::types::{Event, EventId, EventQuery, sort_by_date};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// `None` once the event has been deleted, so a writer that grabbed the slot
/// before the delete sees the deletion instead of resurrecting the event.
type Slot = Arc<Mutex<Option<Event>>>;

/// In-memory event store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use gather_testing::InMemoryEventStore;
/// use gather_testing::fixtures::EventFixture;
/// use gather_core::event_store::{EventStore, Mutation, Precondition, UpdateOutcome};
/// use gather_core::UserId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryEventStore::new();
/// let event = store.create(EventFixture::new("Meetup").max_attendees(1).build()).await?;
///
/// let outcome = store
///     .conditional_update(
///         event.id,
///         vec![Precondition::HasCapacity],
///         Mutation::AppendAttendee(UserId::from("u1")),
///     )
///     .await?;
/// assert!(matches!(outcome, UpdateOutcome::Applied(_)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryEventStore {
    slots: Arc<RwLock<HashMap<EventId, Slot>>>,
    clock: Arc<dyn Clock>,
    failures_remaining: Arc<AtomicUsize>,
}

impl InMemoryEventStore {
    /// Create an empty store stamping writes with the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping writes with `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            clock,
            failures_remaining: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `count` operations fail with [`StoreError::Unavailable`]
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of stored events
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    /// Whether the store holds no event
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().unwrap().is_empty()
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        let consumed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    fn slot(&self, id: EventId) -> Option<Slot> {
        self.slots.read().unwrap().get(&id).cloned()
    }

    fn all_slots(&self) -> Vec<Slot> {
        self.slots.read().unwrap().values().cloned().collect()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for InMemoryEventStore {
    fn find<'a>(&'a self, query: &'a EventQuery) -> StoreFuture<'a, Vec<Event>> {
        Box::pin(async move {
            self.injected_failure()?;

            let mut matching = Vec::new();
            for slot in self.all_slots() {
                if let Some(event) = slot.lock().await.as_ref() {
                    if query.matches(event) {
                        matching.push(event.clone());
                    }
                }
            }
            sort_by_date(&mut matching);
            Ok(matching)
        })
    }

    fn find_by_id(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            self.injected_failure()?;

            let Some(slot) = self.slot(id) else {
                return Ok(None);
            };
            let event = slot.lock().await.clone();
            Ok(event)
        })
    }

    fn create(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            self.injected_failure()?;

            let mut slots = self.slots.write().unwrap();
            if slots.contains_key(&event.id) {
                return Err(StoreError::Database(format!(
                    "event {} already exists",
                    event.id
                )));
            }
            slots.insert(event.id, Arc::new(Mutex::new(Some(event.clone()))));
            Ok(event)
        })
    }

    fn conditional_update(
        &self,
        id: EventId,
        preconditions: Vec<Precondition>,
        mutation: Mutation,
    ) -> StoreFuture<'_, UpdateOutcome> {
        Box::pin(async move {
            self.injected_failure()?;

            let Some(slot) = self.slot(id) else {
                return Ok(UpdateOutcome::NotFound);
            };

            let mut guard = slot.lock().await;
            let Some(current) = guard.as_mut() else {
                return Ok(UpdateOutcome::NotFound);
            };

            if let Some(failed) = Precondition::first_failing(&preconditions, current) {
                return Ok(UpdateOutcome::Rejected {
                    failed: failed.clone(),
                    current: current.clone(),
                });
            }

            // Give competing writers a chance to run between check and write;
            // the slot lock is what keeps them out.
            tokio::task::yield_now().await;

            mutation.apply(current, self.clock.now());
            tracing::trace!(event_id = %id, "in-memory conditional update applied");
            Ok(UpdateOutcome::Applied(current.clone()))
        })
    }

    fn delete_by_id(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.injected_failure()?;

            let removed = self.slots.write().unwrap().remove(&id);
            let Some(slot) = removed else {
                return Ok(false);
            };
            let existed = slot.lock().await.take().is_some();
            Ok(existed)
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::fixtures::EventFixture;
    use crate::mocks::test_clock;
    use gather_core::UserId;

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = InMemoryEventStore::new();
        let event = store.create(EventFixture::new("A").build()).await.unwrap();

        let found = store.find_by_id(event.id).await.unwrap();
        assert_eq!(found, Some(event));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = InMemoryEventStore::new();
        let event = EventFixture::new("A").build();
        store.create(event.clone()).await.unwrap();

        assert!(store.create(event).await.is_err());
    }

    #[tokio::test]
    async fn test_find_sorts_by_date() {
        let store = InMemoryEventStore::new();
        store.create(EventFixture::new("late").on("2026-03-01").build()).await.unwrap();
        store.create(EventFixture::new("early").on("2026-01-01").build()).await.unwrap();

        let events = store.find(&EventQuery::all()).await.unwrap();
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_without_writing() {
        let store = InMemoryEventStore::new();
        let event = store
            .create(EventFixture::new("A").max_attendees(1).attendees(&["u1"]).build())
            .await
            .unwrap();

        let outcome = store
            .conditional_update(
                event.id,
                vec![Precondition::HasCapacity],
                Mutation::AppendAttendee(UserId::from("u2")),
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            UpdateOutcome::Rejected { failed: Precondition::HasCapacity, .. }
        ));
        let stored = store.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(stored.attendees, vec![UserId::from("u1")]);
    }

    #[tokio::test]
    async fn test_conditional_update_stamps_with_clock() {
        let clock = test_clock();
        let store = InMemoryEventStore::with_clock(Arc::new(clock.clone()));
        let event = store.create(EventFixture::new("A").build()).await.unwrap();

        let outcome = store
            .conditional_update(event.id, vec![], Mutation::AppendAttendee(UserId::from("u1")))
            .await
            .unwrap();

        let UpdateOutcome::Applied(updated) = outcome else {
            panic!("expected update to apply");
        };
        assert_eq!(updated.updated_at, clock.now());
    }

    #[tokio::test]
    async fn test_update_after_delete_is_not_found() {
        let store = InMemoryEventStore::new();
        let event = store.create(EventFixture::new("A").build()).await.unwrap();

        assert!(store.delete_by_id(event.id).await.unwrap());
        assert!(!store.delete_by_id(event.id).await.unwrap());

        let outcome = store
            .conditional_update(event.id, vec![], Mutation::AppendAttendee(UserId::from("u1")))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_interleaved_rsvps_respect_capacity() {
        let store = InMemoryEventStore::new();
        let event = store
            .create(EventFixture::new("A").max_attendees(3).build())
            .await
            .unwrap();

        let attempts = (0..10).map(|i| {
            let user = UserId::from(format!("u{i}"));
            store.conditional_update(
                event.id,
                vec![Precondition::NotAttending(user.clone()), Precondition::HasCapacity],
                Mutation::AppendAttendee(user),
            )
        });
        let outcomes = futures::future::join_all(attempts).await;

        let applied = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(UpdateOutcome::Applied(_))))
            .count();
        assert_eq!(applied, 3);
        assert_eq!(store.find_by_id(event.id).await.unwrap().unwrap().attendees.len(), 3);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = InMemoryEventStore::new();
        store.fail_next(1);

        assert!(store.find(&EventQuery::all()).await.is_err());
        assert!(store.find(&EventQuery::all()).await.is_ok());
    }
}
