//! Session identity as seen by the cart subsystem.
//!
//! The cart never owns or changes the shopper's session; it only asks, per
//! operation, whether the session is currently authenticated.

use std::sync::Arc;

use tokio::sync::watch;

use plug_core::SessionStatus;

/// Source of the current session status.
pub trait SessionProvider: Send + Sync {
    /// The session status at the time of the call.
    fn status(&self) -> SessionStatus;

    /// Shorthand for `status().is_authenticated()`.
    fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }
}

impl SessionProvider for SessionStatus {
    fn status(&self) -> SessionStatus {
        *self
    }
}

impl<T: SessionProvider + ?Sized> SessionProvider for Arc<T> {
    fn status(&self) -> SessionStatus {
        (**self).status()
    }
}

/// Shared, observable session status.
///
/// The authentication layer flips it with [`SessionHandle::sign_in`] and
/// [`SessionHandle::sign_out`]; interested parties (the sync reconciler's login
/// hook, UI badges) can [`SessionHandle::subscribe`] to transitions.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionStatus>>,
}

impl SessionHandle {
    /// Create a handle starting in `status`.
    #[must_use]
    pub fn new(status: SessionStatus) -> Self {
        let (tx, _rx) = watch::channel(status);
        Self { tx: Arc::new(tx) }
    }

    /// Create an anonymous handle.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(SessionStatus::Anonymous)
    }

    /// Mark the session authenticated. Returns `true` if this was a transition.
    pub fn sign_in(&self) -> bool {
        self.tx.send_if_modified(|status| {
            let changed = *status != SessionStatus::Authenticated;
            *status = SessionStatus::Authenticated;
            changed
        })
    }

    /// Mark the session anonymous. Returns `true` if this was a transition.
    pub fn sign_out(&self) -> bool {
        self.tx.send_if_modified(|status| {
            let changed = *status != SessionStatus::Anonymous;
            *status = SessionStatus::Anonymous;
            changed
        })
    }

    /// Watch for status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }
}

impl SessionProvider for SessionHandle {
    fn status(&self) -> SessionStatus {
        *self.tx.borrow()
    }
}
