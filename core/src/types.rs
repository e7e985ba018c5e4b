//! Domain types for the Gather event service.
//!
//! This module contains the identifiers, the [`Event`] record and everything
//! that flows into it: the unvalidated creation and edit payloads, their
//! validated forms, and the filters used to discover events.

use crate::error::ValidationErrors;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user, as issued by the identity subsystem.
///
/// Opaque to this service: it is compared, stored and looked up, never parsed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw identifier.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// Metadata of the image attached to an event.
///
/// The bytes live in an external image store; only the reference is kept here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Stored file name
    pub file_name: String,
    /// MIME type of the image
    pub content_type: String,
}

/// An event users can RSVP to.
///
/// Invariants (upheld by every write path):
/// - `attendees.len() <= max_attendees`
/// - `attendees` holds no duplicate identifier
/// - `attendees` is in RSVP order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Event title (non-empty)
    pub title: String,
    /// Event description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: String,
    /// Attendee cap (positive)
    pub max_attendees: u32,
    /// Registered attendees, in RSVP order
    pub attendees: Vec<UserId>,
    /// Attached image, if any
    pub image: Option<ImageRef>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Number of registered attendees.
    #[must_use]
    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }

    /// Whether the attendee cap has been reached.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.attendee_count() >= self.max_attendees as usize
    }

    /// Whether `user_id` is registered.
    #[must_use]
    pub fn has_attendee(&self, user_id: &UserId) -> bool {
        self.attendees.contains(user_id)
    }

    /// Seats left before the cap is reached.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        (self.max_attendees as usize).saturating_sub(self.attendee_count())
    }
}

/// A user as known by the identity subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Where notifications are delivered
    pub email: String,
    /// Name used to greet the user
    pub display_name: String,
}

// ============================================================================
// Dates
// ============================================================================

/// Parse an event date given either as RFC 3339 or as a bare `YYYY-MM-DD`
/// (interpreted as midnight UTC).
#[must_use]
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

// ============================================================================
// Creation
// ============================================================================

/// Initial attendee list as clients send it.
///
/// Either a list of identifiers or a single string, which may itself be a
/// comma-separated list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttendeeList {
    /// `["u1", "u2"]`
    Many(Vec<String>),
    /// `"u1"` or `"u1,u2"`
    Joined(String),
}

impl AttendeeList {
    /// Normalize into an ordered, duplicate-free sequence of identifiers.
    ///
    /// Entries are trimmed, empty entries are dropped, and the first occurrence
    /// of a repeated identifier wins.
    #[must_use]
    pub fn normalize(&self) -> Vec<UserId> {
        match self {
            Self::Many(ids) => dedup_ids(ids.iter().flat_map(|id| id.split(','))),
            Self::Joined(joined) => dedup_ids(joined.split(',')),
        }
    }
}

fn dedup_ids<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    raw.map(str::trim)
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(*id))
        .map(UserId::from)
        .collect()
}

/// Largest accepted attendee cap; stores keep the cap in a 32-bit signed column.
pub const MAX_ATTENDEES_LIMIT: u32 = i32::MAX.unsigned_abs();

/// Event creation payload before validation.
///
/// Every field is optional so that missing fields are reported as validation
/// problems instead of deserialization failures.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventDraft {
    /// Event title
    pub title: Option<String>,
    /// Event description
    pub description: Option<String>,
    /// Event date (RFC 3339 or `YYYY-MM-DD`)
    pub date: Option<String>,
    /// Event location
    pub location: Option<String>,
    /// Attendee cap
    #[serde(alias = "maxAttendees")]
    pub max_attendees: Option<i64>,
    /// Initial attendees
    pub attendees: Option<AttendeeList>,
    /// Image metadata
    pub image: Option<ImageRef>,
}

impl EventDraft {
    /// Validate the draft, collecting every problem.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing each missing or malformed field.
    pub fn validate(self) -> Result<NewEvent, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required_text(&mut errors, "title", self.title);
        let description = required_text(&mut errors, "description", self.description);
        let location = required_text(&mut errors, "location", self.location);

        let date = match self.date.as_deref() {
            None => {
                errors.add("date", "is required");
                None
            }
            Some(raw) => {
                let parsed = parse_event_date(raw);
                if parsed.is_none() {
                    errors.add("date", format!("'{raw}' is not a valid date"));
                }
                parsed
            }
        };

        let max_attendees = match self.max_attendees {
            None => {
                errors.add("max_attendees", "is required");
                None
            }
            Some(n) => match u32::try_from(n) {
                Ok(n) if n > 0 && n <= MAX_ATTENDEES_LIMIT => Some(n),
                Ok(n) if n > MAX_ATTENDEES_LIMIT => {
                    errors.add(
                        "max_attendees",
                        format!("must be at most {MAX_ATTENDEES_LIMIT}"),
                    );
                    None
                }
                _ => {
                    errors.add("max_attendees", "must be a positive integer");
                    None
                }
            },
        };

        let attendees = self
            .attendees
            .as_ref()
            .map(AttendeeList::normalize)
            .unwrap_or_default();

        if let Some(cap) = max_attendees {
            if attendees.len() > cap as usize {
                errors.add(
                    "attendees",
                    format!("{} initial attendees exceed max_attendees ({cap})", attendees.len()),
                );
            }
        }

        match (title, description, date, location, max_attendees) {
            (Some(title), Some(description), Some(date), Some(location), Some(max_attendees))
                if errors.is_empty() =>
            {
                Ok(NewEvent {
                    title,
                    description,
                    date,
                    location,
                    max_attendees,
                    attendees,
                    image: self.image,
                })
            }
            _ => Err(errors),
        }
    }
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(_) => {
            errors.add(field, "cannot be blank");
            None
        }
        None => {
            errors.add(field, "is required");
            None
        }
    }
}

/// A validated creation payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEvent {
    /// Event title
    pub title: String,
    /// Event description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: String,
    /// Attendee cap
    pub max_attendees: u32,
    /// Normalized initial attendees
    pub attendees: Vec<UserId>,
    /// Image metadata from the payload
    pub image: Option<ImageRef>,
}

impl NewEvent {
    /// Build the event record to persist.
    ///
    /// An image reference supplied separately (e.g. by an upload step) takes
    /// precedence over the one carried in the payload.
    #[must_use]
    pub fn into_event(self, id: EventId, image: Option<ImageRef>, now: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            max_attendees: self.max_attendees,
            attendees: self.attendees,
            image: image.or(self.image),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Editing
// ============================================================================

/// Edit payload before validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventPatchDraft {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New date (RFC 3339 or `YYYY-MM-DD`)
    pub date: Option<String>,
    /// New location
    pub location: Option<String>,
}

impl EventPatchDraft {
    /// Validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] if a present field is blank or malformed.
    pub fn validate(self) -> Result<EventPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = optional_text(&mut errors, "title", self.title);
        let description = optional_text(&mut errors, "description", self.description);
        let location = optional_text(&mut errors, "location", self.location);
        let date = self.date.as_deref().and_then(|raw| {
            let parsed = parse_event_date(raw);
            if parsed.is_none() {
                errors.add("date", format!("'{raw}' is not a valid date"));
            }
            parsed
        });

        errors.into_result(EventPatch {
            title,
            description,
            date,
            location,
        })
    }
}

fn optional_text(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(text) if text.trim().is_empty() => {
            errors.add(field, "cannot be blank");
            None
        }
        other => other.map(|text| text.trim().to_string()),
    }
}

/// A validated partial update. Absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New date
    pub date: Option<DateTime<Utc>>,
    /// New location
    pub location: Option<String>,
}

impl EventPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.location.is_none()
    }

    /// Apply the present fields to `event`.
    pub fn apply_to(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Filter options accepted by event discovery.
///
/// Each option is independently optional; present options combine with AND.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Only events on or after this date
    pub date: Option<String>,
    /// Case-insensitive substring of the location
    pub location: Option<String>,
    /// Case-insensitive substring of the title
    pub title: Option<String>,
}

impl EventFilter {
    /// Translate into a store query.
    ///
    /// Blank text options are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] if `date` does not parse.
    pub fn to_query(&self) -> Result<EventQuery, ValidationErrors> {
        let mut query = EventQuery::default();

        if let Some(raw) = self.date.as_deref().filter(|d| !d.trim().is_empty()) {
            let Some(date) = parse_event_date(raw) else {
                return Err(ValidationErrors::single("date", format!("'{raw}' is not a valid date")));
            };
            query.starts_on_or_after = Some(date);
        }
        query.location_contains = non_blank(self.location.as_deref());
        query.title_contains = non_blank(self.title.as_deref());

        Ok(query)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Store-level query. Every present criterion must hold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// `date >= starts_on_or_after`
    pub starts_on_or_after: Option<DateTime<Utc>>,
    /// `date < starts_before`
    pub starts_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
    /// Case-insensitive substring of the location
    pub location_contains: Option<String>,
    /// Events this user has RSVP'd to
    pub attendee: Option<UserId>,
}

impl EventQuery {
    /// Every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Events whose date falls in `[start, end)`.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            starts_on_or_after: Some(start),
            starts_before: Some(end),
            ..Self::default()
        }
    }

    /// Events `user_id` is registered for.
    #[must_use]
    pub fn attended_by(user_id: UserId) -> Self {
        Self {
            attendee: Some(user_id),
            ..Self::default()
        }
    }

    /// Evaluate the query against one event.
    ///
    /// Stores that cannot push a criterion down use this to filter in memory.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.starts_on_or_after.is_none_or(|start| event.date >= start)
            && self.starts_before.is_none_or(|end| event.date < end)
            && self
                .title_contains
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&event.title, needle))
            && self
                .location_contains
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&event.location, needle))
            && self.attendee.as_ref().is_none_or(|user| event.has_attendee(user))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Sort events ascending by date; ties broken by id so the order is stable.
pub fn sort_by_date(events: &mut [Event]) {
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft() -> EventDraft {
        EventDraft {
            title: Some("Rust Meetup".to_string()),
            description: Some("Monthly meetup".to_string()),
            date: Some("2026-11-02T18:30:00Z".to_string()),
            location: Some("Berlin".to_string()),
            max_attendees: Some(3),
            attendees: None,
            image: None,
        }
    }

    fn event(title: &str, location: &str, date: &str) -> Event {
        let now = Utc::now();
        Event {
            id: EventId::new(),
            title: title.to_string(),
            description: String::new(),
            date: parse_event_date(date).unwrap(),
            location: location.to_string(),
            max_attendees: 10,
            attendees: vec![],
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_event_date_formats() {
        let day = parse_event_date("2026-03-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2026-03-01T00:00:00+00:00");

        let instant = parse_event_date("2026-03-01T10:15:00+02:00").unwrap();
        assert_eq!(instant.to_rfc3339(), "2026-03-01T08:15:00+00:00");

        assert!(parse_event_date("next tuesday").is_none());
    }

    #[test]
    fn test_attendee_list_accepts_single_and_joined() {
        assert_eq!(
            AttendeeList::Joined("u1".to_string()).normalize(),
            vec![UserId::from("u1")]
        );
        assert_eq!(
            AttendeeList::Joined(" u1, u2 ,,u1".to_string()).normalize(),
            vec![UserId::from("u1"), UserId::from("u2")]
        );
        assert_eq!(
            AttendeeList::Many(vec!["b".into(), "a".into(), "b".into()]).normalize(),
            vec![UserId::from("b"), UserId::from("a")]
        );
    }

    #[test]
    fn test_attendee_list_deserializes_both_shapes() {
        let many: AttendeeList = serde_json::from_str(r#"["u1","u2"]"#).unwrap();
        let joined: AttendeeList = serde_json::from_str(r#""u1,u2""#).unwrap();
        assert_eq!(many.normalize(), joined.normalize());
    }

    #[test]
    fn test_validate_accepts_complete_draft() {
        let new_event = draft().validate().unwrap();
        assert_eq!(new_event.title, "Rust Meetup");
        assert_eq!(new_event.max_attendees, 3);
        assert!(new_event.attendees.is_empty());
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let errors = EventDraft::default().validate().unwrap_err();
        for field in ["title", "description", "date", "location", "max_attendees"] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut bad = draft();
        bad.title = Some("   ".to_string());
        bad.date = Some("someday".to_string());
        bad.max_attendees = Some(0);

        let errors = bad.validate().unwrap_err();
        assert!(errors.has_field("title"));
        assert!(errors.has_field("date"));
        assert!(errors.has_field("max_attendees"));
    }

    #[test]
    fn test_validate_bounds_cap_to_storable_range() {
        let mut huge = draft();
        huge.max_attendees = Some(3_000_000_000);
        let errors = huge.validate().unwrap_err();
        assert!(errors.has_field("max_attendees"));

        let mut largest = draft();
        largest.max_attendees = Some(i64::from(MAX_ATTENDEES_LIMIT));
        assert_eq!(largest.validate().unwrap().max_attendees, MAX_ATTENDEES_LIMIT);

        let mut beyond = draft();
        beyond.max_attendees = Some(i64::from(MAX_ATTENDEES_LIMIT) + 1);
        assert!(beyond.validate().unwrap_err().has_field("max_attendees"));
    }

    #[test]
    fn test_validate_rejects_initial_attendees_over_cap() {
        let mut crowded = draft();
        crowded.max_attendees = Some(1);
        crowded.attendees = Some(AttendeeList::Joined("u1,u2".to_string()));

        let errors = crowded.validate().unwrap_err();
        assert!(errors.has_field("attendees"));
    }

    #[test]
    fn test_draft_accepts_camel_case_cap() {
        let draft: EventDraft = serde_json::from_str(r#"{"maxAttendees": 5}"#).unwrap();
        assert_eq!(draft.max_attendees, Some(5));
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut target = event("Old", "Paris", "2026-05-01");
        let patch = EventPatchDraft {
            title: Some("New".to_string()),
            ..EventPatchDraft::default()
        }
        .validate()
        .unwrap();

        patch.apply_to(&mut target);
        assert_eq!(target.title, "New");
        assert_eq!(target.location, "Paris");
    }

    #[test]
    fn test_patch_rejects_blank_title() {
        let result = EventPatchDraft {
            title: Some(String::new()),
            ..EventPatchDraft::default()
        }
        .validate();
        assert!(result.unwrap_err().has_field("title"));
    }

    #[test]
    fn test_filter_title_is_case_insensitive_substring() {
        let query = EventFilter {
            title: Some("conf".to_string()),
            ..EventFilter::default()
        }
        .to_query()
        .unwrap();

        assert!(query.matches(&event("RustConf 2026", "Montreal", "2026-09-10")));
        assert!(query.matches(&event("CONFERENCE", "Lyon", "2026-09-10")));
        assert!(!query.matches(&event("Meetup", "Lyon", "2026-09-10")));
    }

    #[test]
    fn test_filter_treats_text_literally() {
        let query = EventFilter {
            title: Some("c++ (".to_string()),
            ..EventFilter::default()
        }
        .to_query()
        .unwrap();

        assert!(query.matches(&event("Intro to C++ (part 1)", "Online", "2026-09-10")));
    }

    #[test]
    fn test_filter_combines_date_and_location() {
        let query = EventFilter {
            date: Some("2026-06-01".to_string()),
            location: Some("berlin".to_string()),
            title: None,
        }
        .to_query()
        .unwrap();

        assert!(query.matches(&event("A", "Berlin Mitte", "2026-06-01")));
        assert!(!query.matches(&event("B", "Berlin Mitte", "2026-05-31")));
        assert!(!query.matches(&event("C", "Hamburg", "2026-07-01")));
    }

    #[test]
    fn test_filter_rejects_bad_date() {
        let result = EventFilter {
            date: Some("tomorrow".to_string()),
            ..EventFilter::default()
        }
        .to_query();
        assert!(result.unwrap_err().has_field("date"));
    }

    #[test]
    fn test_sort_by_date() {
        let mut events = vec![
            event("late", "x", "2026-12-01"),
            event("early", "x", "2026-01-01"),
        ];
        sort_by_date(&mut events);
        assert_eq!(events[0].title, "early");
    }

    proptest! {
        #[test]
        fn prop_normalized_attendees_are_unique_and_ordered(
            ids in proptest::collection::vec("[a-c]{1,2}", 0..20)
        ) {
            let normalized = AttendeeList::Many(ids.clone()).normalize();

            let unique: HashSet<_> = normalized.iter().collect();
            prop_assert_eq!(unique.len(), normalized.len());

            // First-seen order is preserved
            let mut expected: Vec<String> = Vec::new();
            for id in ids {
                if !expected.contains(&id) {
                    expected.push(id);
                }
            }
            let actual: Vec<String> = normalized.into_iter().map(UserId::into_inner).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
