//! Axum integration for the Gather event service.
//!
//! This crate is the thin HTTP edge shared by Gather binaries:
//!
//! - [`error::AppError`]: maps the service error taxonomy onto status codes and
//!   a uniform JSON body
//! - [`auth`]: bearer-token verification and the [`AuthenticatedUser`] extractor
//! - [`handlers`]: endpoints every deployment exposes (`/health`)
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** identity (bearer token) and payload (JSON, query)
//! 3. **Call** the event service
//! 4. **Map** the result or [`gather_core::EventError`] to an HTTP response
//!
//! # Example
//!
//! ```ignore
//! use gather_web::{AppError, AuthenticatedUser};
//! use axum::{Json, extract::{Path, State}};
//!
//! async fn rsvp(
//!     State(state): State<AppState>,
//!     user: AuthenticatedUser,
//!     Path(id): Path<EventId>,
//! ) -> Result<Json<RsvpReceipt>, AppError> {
//!     let receipt = state.events.rsvp_event(id, user.user_id).await?;
//!     Ok(Json(receipt))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod error;
pub mod handlers;

// Re-export key types for convenience
pub use auth::{AuthError, AuthenticatedUser, BearerToken, Claims, JwtVerifier};
pub use error::AppError;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
