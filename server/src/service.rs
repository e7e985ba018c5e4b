//! The Event Service: every operation the REST surface exposes.
//!
//! The service composes the event store, the capacity guard and the dispatch
//! queue. It never awaits delivery: notifications are handed to the
//! [`DispatchQueue`] and the caller's result depends only on the store.

use gather_core::environment::Clock;
use gather_core::event_store::{EventStore, Mutation, Precondition, UpdateOutcome};
use gather_core::types::{EventDraft, EventPatchDraft};
use gather_core::{
    Event, EventError, EventFilter, EventId, EventQuery, ImageRef, NotificationKind, StoreError, UserId,
};
use gather_runtime::metrics;
use gather_runtime::queue::{DispatchJob, DispatchQueue};
use serde::Serialize;
use std::sync::Arc;

/// Result of a successful RSVP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsvpReceipt {
    /// Event registered for
    pub event_id: EventId,
    /// Attendee count after the registration
    pub attendee_count: usize,
    /// The event's cap
    pub max_attendees: u32,
}

/// Event operations.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    queue: DispatchQueue,
    clock: Arc<dyn Clock>,
}

impl EventService {
    /// Create a service over `store`, handing notifications to `queue`.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, queue: DispatchQueue, clock: Arc<dyn Clock>) -> Self {
        Self { store, queue, clock }
    }

    /// Validate `draft` and persist it as a new event.
    ///
    /// `image` is the reference an upload step produced, if any; it wins over
    /// image metadata carried in the payload.
    ///
    /// # Errors
    ///
    /// [`EventError::Validation`] listing every field problem, or
    /// [`EventError::Storage`].
    #[tracing::instrument(skip_all)]
    pub async fn create_event(&self, draft: EventDraft, image: Option<ImageRef>) -> Result<Event, EventError> {
        let new_event = draft.validate()?;
        let event = new_event.into_event(EventId::new(), image, self.clock.now());

        let event = self.store.create(event).await?;
        metrics::record_event_created();
        tracing::info!(
            event_id = %event.id,
            max_attendees = event.max_attendees,
            attendees = event.attendee_count(),
            "Event created"
        );
        Ok(event)
    }

    /// Events matching `filter`, ascending by date.
    ///
    /// # Errors
    ///
    /// [`EventError::Validation`] if the date filter does not parse, or
    /// [`EventError::Storage`].
    pub async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>, EventError> {
        let query = filter.to_query()?;
        Ok(self.store.find(&query).await?)
    }

    /// One event.
    ///
    /// # Errors
    ///
    /// [`EventError::NotFound`] or [`EventError::Storage`].
    pub async fn get_event(&self, id: EventId) -> Result<Event, EventError> {
        self.store.find_by_id(id).await?.ok_or(EventError::NotFound(id))
    }

    /// Apply the fields present in `draft` and notify every current attendee.
    ///
    /// # Errors
    ///
    /// [`EventError::Validation`], [`EventError::NotFound`] or
    /// [`EventError::Storage`].
    #[tracing::instrument(skip(self, draft), fields(event_id = %id))]
    pub async fn edit_event(&self, id: EventId, draft: EventPatchDraft) -> Result<Event, EventError> {
        let patch = draft.validate()?;

        let event = match self
            .store
            .conditional_update(id, Vec::new(), Mutation::Apply(patch))
            .await?
        {
            UpdateOutcome::Applied(event) => event,
            UpdateOutcome::NotFound => return Err(EventError::NotFound(id)),
            UpdateOutcome::Rejected { failed, .. } => {
                return Err(StoreError::Database(format!(
                    "unconditional edit rejected by {failed:?}"
                ))
                .into());
            }
        };

        tracing::info!(attendees = event.attendee_count(), "Event updated");
        if !event.attendees.is_empty() {
            self.queue
                .enqueue(DispatchJob::attendees(event.clone(), NotificationKind::Updated));
        }
        Ok(event)
    }

    /// Remove an event. It drops out of every later reminder firing.
    ///
    /// # Errors
    ///
    /// [`EventError::NotFound`] or [`EventError::Storage`].
    #[tracing::instrument(skip(self), fields(event_id = %id))]
    pub async fn delete_event(&self, id: EventId) -> Result<(), EventError> {
        if self.store.delete_by_id(id).await? {
            tracing::info!("Event deleted");
            Ok(())
        } else {
            Err(EventError::NotFound(id))
        }
    }

    /// Register `user_id` for event `id`.
    ///
    /// The duplicate check, the capacity check and the append happen as one
    /// conditional update, so concurrent RSVPs can neither overshoot the cap
    /// nor register the same user twice. On success the user is sent an
    /// RSVP confirmation.
    ///
    /// # Errors
    ///
    /// [`EventError::NotFound`], [`EventError::DuplicateRsvp`],
    /// [`EventError::EventFull`] or [`EventError::Storage`].
    #[tracing::instrument(skip(self), fields(event_id = %id, user_id = %user_id))]
    pub async fn rsvp_event(&self, id: EventId, user_id: UserId) -> Result<RsvpReceipt, EventError> {
        let outcome = self
            .store
            .conditional_update(
                id,
                vec![
                    Precondition::NotAttending(user_id.clone()),
                    Precondition::HasCapacity,
                ],
                Mutation::AppendAttendee(user_id.clone()),
            )
            .await
            .inspect_err(|_| metrics::record_rsvp("error"))?;

        match outcome {
            UpdateOutcome::Applied(event) => {
                metrics::record_rsvp("accepted");
                let receipt = RsvpReceipt {
                    event_id: event.id,
                    attendee_count: event.attendee_count(),
                    max_attendees: event.max_attendees,
                };
                tracing::info!(attendees = receipt.attendee_count, "RSVP accepted");
                self.queue
                    .enqueue(DispatchJob::user(event, user_id, NotificationKind::RsvpConfirmed));
                Ok(receipt)
            }
            UpdateOutcome::Rejected {
                failed: Precondition::NotAttending(_),
                ..
            } => {
                metrics::record_rsvp("duplicate");
                Err(EventError::DuplicateRsvp { event_id: id, user_id })
            }
            UpdateOutcome::Rejected {
                failed: Precondition::HasCapacity,
                current,
            } => {
                metrics::record_rsvp("full");
                Err(EventError::EventFull {
                    event_id: id,
                    max_attendees: current.max_attendees,
                })
            }
            UpdateOutcome::NotFound => {
                metrics::record_rsvp("not_found");
                Err(EventError::NotFound(id))
            }
        }
    }

    /// Events `user_id` has RSVP'd to, ascending by date.
    ///
    /// # Errors
    ///
    /// [`EventError::Storage`].
    pub async fn get_user_rsvps(&self, user_id: UserId) -> Result<Vec<Event>, EventError> {
        Ok(self.store.find(&EventQuery::attended_by(user_id)).await?)
    }

    /// The dispatch queue notifications go through.
    #[must_use]
    pub const fn queue(&self) -> &DispatchQueue {
        &self.queue
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use gather_core::types::AttendeeList;
    use gather_runtime::dispatcher::NotificationDispatcher;
    use gather_testing::fixtures::{EventFixture, user};
    use gather_testing::{InMemoryEventStore, InMemoryUserDirectory, RecordingChannel, test_clock};

    struct Harness {
        service: EventService,
        store: InMemoryEventStore,
        channel: RecordingChannel,
    }

    fn harness() -> Harness {
        let store = InMemoryEventStore::new();
        let directory = ["u1", "u2", "u3"]
            .into_iter()
            .fold(InMemoryUserDirectory::new(), |dir, id| dir.with_user(user(id)));
        let channel = RecordingChannel::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(directory), Arc::new(channel.clone()));
        let queue = DispatchQueue::start(dispatcher, 64);

        Harness {
            service: EventService::new(Arc::new(store.clone()), queue, Arc::new(test_clock())),
            store,
            channel,
        }
    }

    fn draft(max_attendees: i64) -> EventDraft {
        EventDraft {
            title: Some("RustConf".to_string()),
            description: Some("Talks".to_string()),
            date: Some("2026-09-10".to_string()),
            location: Some("Montreal".to_string()),
            max_attendees: Some(max_attendees),
            attendees: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_attendees() {
        let h = harness();
        let mut payload = draft(5);
        payload.attendees = Some(AttendeeList::Joined("u1, u2,u1".to_string()));

        let event = h.service.create_event(payload, None).await.unwrap();

        assert_eq!(event.attendees, vec![UserId::from("u1"), UserId::from("u2")]);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_incomplete_payload() {
        let h = harness();
        let err = h
            .service
            .create_event(EventDraft::default(), None)
            .await
            .unwrap_err();

        let EventError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.has_field("title"));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_uploaded_image_wins() {
        let h = harness();
        let image = ImageRef {
            file_name: "abc.png".to_string(),
            content_type: "image/png".to_string(),
        };

        let event = h.service.create_event(draft(1), Some(image.clone())).await.unwrap();
        assert_eq!(event.image, Some(image));
    }

    #[tokio::test]
    async fn test_rsvp_scenario() {
        let h = harness();
        let event = h.service.create_event(draft(2), None).await.unwrap();

        let first = h.service.rsvp_event(event.id, UserId::from("u1")).await.unwrap();
        assert_eq!(first.attendee_count, 1);

        let second = h.service.rsvp_event(event.id, UserId::from("u2")).await.unwrap();
        assert_eq!(second.attendee_count, 2);

        assert!(matches!(
            h.service.rsvp_event(event.id, UserId::from("u3")).await,
            Err(EventError::EventFull { max_attendees: 2, .. })
        ));
        assert!(matches!(
            h.service.rsvp_event(event.id, UserId::from("u1")).await,
            Err(EventError::DuplicateRsvp { .. })
        ));

        let stored = h.service.get_event(event.id).await.unwrap();
        assert_eq!(stored.attendees, vec![UserId::from("u1"), UserId::from("u2")]);
    }

    #[tokio::test]
    async fn test_rsvp_sends_one_confirmation() {
        let h = harness();
        let event = h.service.create_event(draft(2), None).await.unwrap();

        h.service.rsvp_event(event.id, UserId::from("u1")).await.unwrap();
        h.service.queue().flush().await;

        let sent = h.channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "u1@example.com");
        assert_eq!(sent[0].subject, "RSVP Confirmed: RustConf");
    }

    #[tokio::test]
    async fn test_rsvp_unknown_event() {
        let h = harness();
        assert!(matches!(
            h.service.rsvp_event(EventId::new(), UserId::from("u1")).await,
            Err(EventError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_not_found() {
        let h = harness();
        let id = EventId::new();
        assert!(matches!(
            h.service.delete_event(id).await,
            Err(EventError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_event() {
        let h = harness();
        let event = h.service.create_event(draft(2), None).await.unwrap();

        h.service.delete_event(event.id).await.unwrap();

        assert!(matches!(
            h.service.get_event(event.id).await,
            Err(EventError::NotFound(_))
        ));
        assert!(h.service.delete_event(event.id).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_touches_only_present_fields_and_notifies_once_each() {
        let h = harness();
        let event = h
            .store
            .create(EventFixture::new("Old title").attendees(&["u1", "u2"]).build())
            .await
            .unwrap();

        let patch = EventPatchDraft {
            title: Some("New title".to_string()),
            location: Some("Berlin".to_string()),
            ..EventPatchDraft::default()
        };
        let updated = h.service.edit_event(event.id, patch).await.unwrap();
        h.service.queue().flush().await;

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.location, "Berlin");
        assert_eq!(updated.description, event.description);
        assert_eq!(updated.date, event.date);

        let mut recipients = h.channel.recipients();
        recipients.sort();
        assert_eq!(recipients, vec!["u1@example.com", "u2@example.com"]);
        assert!(h.channel.sent().iter().all(|n| n.subject == "Event Notification: New title"));
    }

    #[tokio::test]
    async fn test_edit_unknown_event() {
        let h = harness();
        assert!(matches!(
            h.service.edit_event(EventId::new(), EventPatchDraft::default()).await,
            Err(EventError::NotFound(_))
        ));
        assert!(h.channel.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_edit_rejects_blank_title() {
        let h = harness();
        let event = h.store.create(EventFixture::new("Keep").build()).await.unwrap();

        let patch = EventPatchDraft {
            title: Some("  ".to_string()),
            ..EventPatchDraft::default()
        };
        assert!(matches!(
            h.service.edit_event(event.id, patch).await,
            Err(EventError::Validation(_))
        ));
        assert_eq!(h.service.get_event(event.id).await.unwrap().title, "Keep");
    }

    #[tokio::test]
    async fn test_get_events_filters_and_sorts() {
        let h = harness();
        for (title, date, location) in [
            ("Rust Conf", "2026-06-01", "Montreal"),
            ("PyConf", "2026-05-01", "Montreal"),
            ("Meetup", "2026-04-01", "Berlin"),
        ] {
            h.store
                .create(EventFixture::new(title).on(date).location(location).build())
                .await
                .unwrap();
        }

        let filter = EventFilter {
            title: Some("conf".to_string()),
            ..EventFilter::default()
        };
        let titles: Vec<_> = h
            .service
            .get_events(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["PyConf", "Rust Conf"]);

        let filter = EventFilter {
            date: Some("2026-05-15".to_string()),
            location: Some("montreal".to_string()),
            title: None,
        };
        let found = h.service.get_events(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Rust Conf");

        let bad = EventFilter {
            date: Some("soon".to_string()),
            ..EventFilter::default()
        };
        assert!(matches!(
            h.service.get_events(&bad).await,
            Err(EventError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_user_rsvps() {
        let h = harness();
        let a = h.service.create_event(draft(3), None).await.unwrap();
        let _b = h.service.create_event(draft(3), None).await.unwrap();

        h.service.rsvp_event(a.id, UserId::from("u1")).await.unwrap();

        let mine = h.service.get_user_rsvps(UserId::from("u1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, a.id);
        assert!(h.service.get_user_rsvps(UserId::from("u9")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let h = harness();
        let event = h.service.create_event(draft(3), None).await.unwrap();

        h.store.fail_next(1);
        assert!(matches!(
            h.service.rsvp_event(event.id, UserId::from("u1")).await,
            Err(EventError::Storage(_))
        ));
    }
}
