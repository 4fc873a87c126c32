//! Wiring shared by every consumer of the cart subsystem.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::api::{ApiError, CartApiClient};
use crate::config::{CartApiConfig, CartConfig};
use crate::events::CartEvents;
use crate::facade::CartFacade;
use crate::guest::GuestCartStore;
use crate::session::SessionHandle;
use crate::storage::{FileStorage, LocalStorage};
use crate::sync::SyncReconciler;

/// Storage handle shared by the façade and the reconciler.
pub type SharedStorage = Arc<dyn LocalStorage>;

/// Façade over the production client.
pub type Cart = CartFacade<CartApiClient, SharedStorage, SessionHandle>;

/// Reconciler over the production client.
pub type CartSync = SyncReconciler<CartApiClient, SharedStorage, SessionHandle>;

/// The cart façade and sync reconciler wired to the same storage, API
/// client, session, and event channel.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct CartSubsystem {
    inner: Arc<CartSubsystemInner>,
}

struct CartSubsystemInner {
    facade: Cart,
    reconciler: CartSync,
    session: SessionHandle,
}

impl CartSubsystem {
    /// Build the subsystem with guest carts persisted under
    /// `config.guest.dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn new(config: &CartConfig, session: SessionHandle) -> Result<Self, ApiError> {
        let storage: SharedStorage = Arc::new(FileStorage::new(&config.guest.dir));
        Self::with_storage(&config.api, config.guest.ttl, storage, session)
    }

    /// Build the subsystem over an explicit storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn with_storage(
        api_config: &CartApiConfig,
        guest_ttl: chrono::Duration,
        storage: SharedStorage,
        session: SessionHandle,
    ) -> Result<Self, ApiError> {
        let api = CartApiClient::new(api_config)?;
        let guest = GuestCartStore::new(storage).with_ttl(guest_ttl);
        let events = CartEvents::new();

        let reconciler =
            SyncReconciler::new(guest.clone(), api.clone(), session.clone(), events.clone());
        let facade = CartFacade::new(guest, api, session.clone(), events);

        Ok(Self {
            inner: Arc::new(CartSubsystemInner {
                facade,
                reconciler,
                session,
            }),
        })
    }

    #[must_use]
    pub fn facade(&self) -> &Cart {
        &self.inner.facade
    }

    #[must_use]
    pub fn reconciler(&self) -> &CartSync {
        &self.inner.reconciler
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    #[must_use]
    pub fn events(&self) -> &CartEvents {
        self.inner.facade.events()
    }

    #[must_use]
    pub fn guest(&self) -> &GuestCartStore<SharedStorage> {
        self.inner.facade.guest()
    }

    #[must_use]
    pub fn api(&self) -> &CartApiClient {
        self.inner.facade.api()
    }

    /// Migrate guest carts every time the session signs in.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use = "dropping the handle detaches the task"]
    pub fn spawn_login_sync(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let session = inner.session.subscribe();
        tokio::spawn(async move { inner.reconciler.sync_on_login(session).await })
    }
}
