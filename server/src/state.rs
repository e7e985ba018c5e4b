//! Application state shared with handlers.

use crate::service::EventService;
use axum::extract::FromRef;
use gather_web::JwtVerifier;
use std::sync::Arc;

/// Shared application state.
///
/// Cheap to clone: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Event operations
    pub events: Arc<EventService>,
    /// Bearer-token verification for protected routes
    pub verifier: JwtVerifier,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub fn new(events: EventService, verifier: JwtVerifier) -> Self {
        Self {
            events: Arc::new(events),
            verifier,
        }
    }
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}
