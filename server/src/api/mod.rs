//! REST handlers.

pub mod events;
