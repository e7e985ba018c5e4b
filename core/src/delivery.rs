//! Delivery channel port.
//!
//! This trait abstracts over how a message reaches a person (SMTP relay,
//! transactional email API, console in development).

use crate::error::DispatchError;
use crate::notification::Notification;
use std::future::Future;
use std::pin::Pin;

/// Sends one notification to one recipient.
pub trait DeliveryChannel: Send + Sync {
    /// Deliver `notification`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The recipient address is invalid
    /// - The transport rejects or fails to deliver the message
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>>;
}
