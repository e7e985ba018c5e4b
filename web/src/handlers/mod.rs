//! Handlers shared by every Gather HTTP surface.

pub mod health;

pub use health::health_check;
