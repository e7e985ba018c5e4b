//! Delivery channels: how a rendered notification leaves the process.
//!
//! - [`SmtpMailer`]: relays through an SMTP server
//! - [`ConsoleMailer`]: logs the message, for development

pub mod console;
pub mod smtp;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;
