//! Recording delivery channel.
//!
//! Mirrors the console email provider: nothing leaves the process. Every
//! attempt is recorded, and chosen recipients can be made to fail or stall so
//! tests can observe how a fan-out behaves when some sends go wrong.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap on lock poisoning

use gather_core::delivery::DeliveryChannel;
use gather_core::{DispatchError, Notification};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorded {
    attempts: Vec<String>,
    sent: Vec<Notification>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Delivery channel that records what it was asked to send.
///
/// Addresses without an `@` are rejected with
/// [`DispatchError::InvalidAddress`], like a real transport would.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingChannel {
    /// Create a channel that delivers everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `address` fail with a delivery error
    #[must_use]
    pub fn failing_for(self, address: impl Into<String>) -> Self {
        self.inner.lock().unwrap().failing.insert(address.into());
        self
    }

    /// Make sends to `address` take `delay` before succeeding
    #[must_use]
    pub fn delayed_for(self, address: impl Into<String>, delay: Duration) -> Self {
        self.inner.lock().unwrap().delays.insert(address.into(), delay);
        self
    }

    /// Successfully delivered notifications, in completion order
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Recipients of successfully delivered notifications
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.recipient).collect()
    }

    /// Every address a send was attempted for, including failures
    #[must_use]
    pub fn attempts(&self) -> Vec<String> {
        self.inner.lock().unwrap().attempts.clone()
    }

    /// Forget everything recorded so far, keeping failure and delay settings
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.clear();
        inner.sent.clear();
    }
}

impl DeliveryChannel for RecordingChannel {
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>> {
        Box::pin(async move {
            let (fails, delay) = {
                let mut inner = self.inner.lock().unwrap();
                inner.attempts.push(notification.recipient.clone());
                (
                    inner.failing.contains(&notification.recipient),
                    inner.delays.get(&notification.recipient).copied(),
                )
            };

            if !notification.recipient.contains('@') {
                return Err(DispatchError::InvalidAddress {
                    address: notification.recipient,
                    reason: "missing @".to_string(),
                });
            }

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if fails {
                return Err(DispatchError::Delivery(format!(
                    "mailbox {} rejected the message",
                    notification.recipient
                )));
            }

            tracing::debug!(to = %notification.recipient, subject = %notification.subject, "recorded notification");
            self.inner.lock().unwrap().sent.push(notification);
            Ok(())
        })
    }
}
