//! Router configuration for the Gather server.

use crate::api::events;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, put},
};
use gather_web::handlers::health_check;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Every response carries an `x-request-id` header (taken from the request or
/// generated), and every request is traced.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/my-rsvps", get(events::my_rsvps))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/rsvp", put(events::rsvp_event));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
