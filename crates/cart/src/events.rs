//! Cart notification channel.
//!
//! Components that show cart state (badges, drawers, the CLI) subscribe to
//! [`CartEvents`] and re-render when a [`CartEvent`] arrives. Sending never
//! blocks and never fails the cart operation that triggered it; events sent
//! while nobody is subscribed are dropped.

use serde::Serialize;
use tokio::sync::broadcast;

use plug_core::StoreId;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// Something a cart view may need to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CartEvent {
    /// A guest cart changed locally.
    #[serde(rename_all = "camelCase")]
    GuestCartUpdated { store_id: StoreId },
    /// The server-side cart changed; cached copies are stale.
    #[serde(rename_all = "camelCase")]
    CartInvalidated { store_id: StoreId },
    /// A message for the shopper.
    Notice(Notification),
}

/// Shopper-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

impl Notification {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Broadcast sender for cart events.
#[derive(Debug, Clone)]
pub struct CartEvents {
    tx: broadcast::Sender<CartEvent>,
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl CartEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Receive every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: CartEvent) {
        tracing::trace!(?event, "Cart event");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn guest_cart_updated(&self, store_id: StoreId) {
        self.emit(CartEvent::GuestCartUpdated { store_id });
    }

    pub fn cart_invalidated(&self, store_id: StoreId) {
        self.emit(CartEvent::CartInvalidated { store_id });
    }

    pub fn notify(&self, notification: Notification) {
        self.emit(CartEvent::Notice(notification));
    }
}
