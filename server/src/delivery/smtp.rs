//! SMTP delivery channel using Lettre.

use gather_core::delivery::DeliveryChannel;
use gather_core::{DispatchError, Notification};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::future::Future;
use std::pin::Pin;

/// Sends notifications through an SMTP relay (STARTTLS/TLS via rustls).
///
/// The Lettre transport is blocking, so each send runs on the blocking pool.
///
/// # Examples
///
/// ```ignore
/// use gather_server::delivery::SmtpMailer;
///
/// let mailer = SmtpMailer::new(
///     "smtp.example.com",
///     587,
///     Some(("user".to_string(), "app_password".to_string())),
///     "noreply@example.com",
///     "Gather",
/// )?;
/// ```
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer relaying through `smtp_server:smtp_port`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidAddress`] if the sender address does not
    /// parse, or [`DispatchError::Delivery`] if the relay cannot be configured.
    pub fn new(
        smtp_server: &str,
        smtp_port: u16,
        credentials: Option<(String, String)>,
        from_email: &str,
        from_name: &str,
    ) -> Result<Self, DispatchError> {
        let from_header = format!("{from_name} <{from_email}>");
        let from = from_header
            .parse::<Mailbox>()
            .map_err(|e| DispatchError::InvalidAddress {
                address: from_header.clone(),
                reason: e.to_string(),
            })?;

        let mut builder = SmtpTransport::relay(smtp_server)
            .map_err(|e| DispatchError::Delivery(format!("SMTP relay error: {e}")))?
            .port(smtp_port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, DispatchError> {
        let to = notification
            .recipient
            .parse::<Mailbox>()
            .map_err(|e| DispatchError::InvalidAddress {
                address: notification.recipient.clone(),
                reason: e.to_string(),
            })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| DispatchError::Delivery(format!("Failed to build email: {e}")))
    }
}

impl DeliveryChannel for SmtpMailer {
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>> {
        Box::pin(async move {
            let email = self.build_message(&notification)?;
            let transport = self.transport.clone();

            tokio::task::spawn_blocking(move || {
                transport
                    .send(&email)
                    .map_err(|e| DispatchError::Delivery(format!("Failed to send email: {e}")))
            })
            .await
            .map_err(|e| DispatchError::Delivery(format!("Email task failed: {e}")))?
            .map(|_| ())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new("localhost", 2525, None, "noreply@example.com", "Gather").unwrap()
    }

    #[test]
    fn test_bad_sender_is_rejected() {
        let result = SmtpMailer::new("localhost", 2525, None, "not an address", "Gather");
        assert!(matches!(result, Err(DispatchError::InvalidAddress { .. })));
    }

    #[test]
    fn test_message_is_addressed_to_recipient() {
        let notification = Notification {
            recipient: "ada@example.com".to_string(),
            subject: "Event Reminder: RustConf".to_string(),
            body: "Dear Ada".to_string(),
        };

        let message = mailer().build_message(&notification).unwrap();
        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 1);
        assert_eq!(envelope.to()[0].to_string(), "ada@example.com");
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_connecting() {
        let notification = Notification {
            recipient: "nobody".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };

        assert!(matches!(
            mailer().send(notification).await,
            Err(DispatchError::InvalidAddress { .. })
        ));
    }
}
