//! # Gather Server
//!
//! The Gather event service: events users can RSVP to, capped at a maximum
//! number of attendees, with attendees notified when an event changes and
//! reminded the day before it takes place.
//!
//! ## Layout
//!
//! - [`service`]: the Event Service (create, list, edit, delete, RSVP)
//! - [`api`] and [`router`]: the REST surface
//! - [`delivery`]: SMTP and console delivery channels
//! - [`config`]: environment configuration
//! - [`state`]: state shared with handlers

pub mod api;
pub mod config;
pub mod delivery;
pub mod router;
pub mod service;
pub mod state;

pub use config::Config;
pub use router::build_router;
pub use service::{EventService, RsvpReceipt};
pub use state::AppState;
