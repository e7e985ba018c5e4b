//! Console delivery channel.

use gather_core::delivery::DeliveryChannel;
use gather_core::{DispatchError, Notification};
use std::future::Future;
use std::pin::Pin;

/// Logs each message instead of sending it.
///
/// Addresses are still checked so that development runs surface the same
/// invalid-recipient failures production would.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

impl DeliveryChannel for ConsoleMailer {
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>> {
        Box::pin(async move {
            if !notification.recipient.contains('@') {
                return Err(DispatchError::InvalidAddress {
                    address: notification.recipient,
                    reason: "missing '@'".to_string(),
                });
            }

            tracing::info!(
                recipient = %notification.recipient,
                subject = %notification.subject,
                body = %notification.body,
                "Email (console)"
            );
            Ok(())
        })
    }
}
