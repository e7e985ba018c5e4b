//! Event API endpoints.
//!
//! - POST /api/events - Create an event
//! - GET /api/events - List events (`?date=&location=&title=`)
//! - GET /api/events/my-rsvps - Events the caller has RSVP'd to (requires auth)
//! - GET /api/events/:id - Get one event
//! - PUT /api/events/:id - Edit an event and notify its attendees (requires auth)
//! - DELETE /api/events/:id - Delete an event (requires auth)
//! - PUT /api/events/:id/rsvp - RSVP to an event (requires auth)

use crate::service::RsvpReceipt;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use gather_core::types::{EventDraft, EventPatchDraft};
use gather_core::{Event, EventFilter, EventId};
use gather_web::{AppError, AuthenticatedUser};
use serde::Serialize;

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome
    pub message: String,
}

fn event_id(path: Result<Path<EventId>, PathRejection>) -> Result<EventId, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::bad_request(format!("Invalid event id: {}", e.body_text())))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

/// Create an event.
///
/// Missing or malformed fields are all reported at once with 422.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:3000/api/events \
///   -H "Content-Type: application/json" \
///   -d '{
///     "title": "RustConf",
///     "description": "Annual conference",
///     "date": "2026-09-10",
///     "location": "Montreal",
///     "maxAttendees": 200,
///     "attendees": "u1,u2"
///   }'
/// ```
///
/// # Errors
///
/// Returns error if validation fails or the store is unavailable.
pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<EventDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let draft = json_body(payload)?;
    let event = state.events.create_event(draft, None).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// List events matching the query filters, ascending by date.
///
/// # Errors
///
/// Returns error if the date filter is malformed or the store is unavailable.
pub async fn list_events(
    State(state): State<AppState>,
    filter: Result<Query<EventFilter>, QueryRejection>,
) -> Result<Json<Vec<Event>>, AppError> {
    let Query(filter) = filter.map_err(|e| AppError::bad_request(e.body_text()))?;
    let events = state.events.get_events(&filter).await?;
    Ok(Json(events))
}

/// Events the authenticated caller has RSVP'd to.
///
/// # Errors
///
/// Returns error if the store is unavailable.
pub async fn my_rsvps(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = state.events.get_user_rsvps(user.user_id).await?;
    Ok(Json(events))
}

/// Get one event.
///
/// # Errors
///
/// Returns error if the event does not exist or the store is unavailable.
pub async fn get_event(
    State(state): State<AppState>,
    path: Result<Path<EventId>, PathRejection>,
) -> Result<Json<Event>, AppError> {
    let id = event_id(path)?;
    let event = state.events.get_event(id).await?;
    Ok(Json(event))
}

/// Edit an event. Attendees are notified in the background.
///
/// # Errors
///
/// Returns error if the caller is unauthenticated, the patch is invalid, the
/// event does not exist, or the store is unavailable.
pub async fn update_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<EventId>, PathRejection>,
    payload: Result<Json<EventPatchDraft>, JsonRejection>,
) -> Result<Json<Event>, AppError> {
    let id = event_id(path)?;
    let patch = json_body(payload)?;
    tracing::debug!(event_id = %id, user_id = %user.user_id, "Edit requested");

    let event = state.events.edit_event(id, patch).await?;
    Ok(Json(event))
}

/// Delete an event.
///
/// # Errors
///
/// Returns error if the caller is unauthenticated, the event does not exist,
/// or the store is unavailable.
pub async fn delete_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<EventId>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = event_id(path)?;
    tracing::debug!(event_id = %id, user_id = %user.user_id, "Delete requested");

    state.events.delete_event(id).await?;
    Ok(Json(MessageResponse {
        message: "Event deleted successfully".to_string(),
    }))
}

/// RSVP the authenticated caller to an event.
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:3000/api/events/<id>/rsvp \
///   -H "Authorization: Bearer <token>"
/// # {"event_id":"<id>","attendee_count":3,"max_attendees":200}
/// ```
///
/// # Errors
///
/// Returns 409 if the caller already RSVP'd or the event is full, 404 if the
/// event does not exist.
pub async fn rsvp_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<EventId>, PathRejection>,
) -> Result<Json<RsvpReceipt>, AppError> {
    let id = event_id(path)?;
    let receipt = state.events.rsvp_event(id, user.user_id).await?;
    Ok(Json(receipt))
}
