use std::future::pending;

use campus_core::ServiceError;
use tokio::sync::mpsc;

type UnsubscribeFn = Box<dyn FnOnce() -> Result<(), ServiceError> + Send>;

/// A stream of change notifications from the hosted service plus the handle
/// that releases it.
///
/// Releasing happens at most once, either through [`Subscription::unsubscribe`]
/// or on drop. Failures while releasing are logged and never propagated.
pub struct Subscription<T> {
    events: mpsc::UnboundedReceiver<T>,
    unsubscribe: Option<UnsubscribeFn>,
}

impl<T> Subscription<T> {
    pub fn new(
        events: mpsc::UnboundedReceiver<T>,
        unsubscribe: impl FnOnce() -> Result<(), ServiceError> + Send + 'static,
    ) -> Self {
        Self {
            events,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Create a subscription together with the sender that feeds it.
    pub fn channel(
        unsubscribe: impl FnOnce() -> Result<(), ServiceError> + Send + 'static,
    ) -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, unsubscribe))
    }

    /// An already-ended subscription with nothing to release.
    ///
    /// For stores without live change notification.
    pub fn closed() -> Self {
        let (_tx, rx) = mpsc::unbounded_channel();
        Self {
            events: rx,
            unsubscribe: None,
        }
    }

    /// Next notification, or `None` once the stream ended or was released.
    pub async fn recv(&mut self) -> Option<T> {
        self.events.recv().await
    }

    /// Release the subscription. Returns `true` only for the call that
    /// actually released it.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(release) = self.unsubscribe.take() else {
            return false;
        };
        self.events.close();
        if let Err(err) = release() {
            tracing::warn!(error = %err, "Failed to release subscription");
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Wait on an optional subscription.
///
/// Pends forever when the slot is empty. When the stream ends the
/// subscription is released and the slot cleared, so a finished stream never
/// busy-loops a `select!`.
pub(crate) async fn next_in<T>(slot: &mut Option<Subscription<T>>) -> T {
    if let Some(subscription) = slot.as_mut() {
        if let Some(event) = subscription.recv().await {
            return event;
        }
        if let Some(mut finished) = slot.take() {
            finished.unsubscribe();
        }
    }
    pending().await
}
