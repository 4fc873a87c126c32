//! Guest cart store.
//!
//! Persists per-store carts for anonymous visitors under a single namespaced
//! key in a [`LocalStorage`] backend.
//!
//! # Behavior
//!
//! - Every mutation reads the *whole* collection, applies the change, and
//!   writes the whole collection back. Concurrent writers are last-writer-wins.
//! - Carts inactive for longer than the TTL (7 days by default) are pruned on
//!   every read; the pruned collection is written back.
//! - Nothing here returns an error. Unreadable or corrupt storage reads as an
//!   empty collection; failed writes are logged and dropped.

use chrono::{Duration, Utc};
use tracing::{debug, instrument, warn};

use plug_core::{GUEST_CART_TTL_DAYS, GuestCart, GuestCartCollection, ProductId, StoreId};

use crate::storage::{LocalStorage, StorageError};

/// Storage key holding the serialized guest cart collection.
pub const GUEST_CART_STORAGE_KEY: &str = "findyourplug:guest-carts";

/// Guest cart store over a [`LocalStorage`] backend.
#[derive(Debug, Clone)]
pub struct GuestCartStore<S> {
    storage: S,
    key: String,
    ttl: Duration,
}

impl<S: LocalStorage> GuestCartStore<S> {
    /// Create a store using the default key and 7-day expiration.
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: GUEST_CART_STORAGE_KEY.to_string(),
            ttl: Duration::days(GUEST_CART_TTL_DAYS),
        }
    }

    /// Override the inactivity window after which carts expire.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the storage key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The underlying storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// All non-expired carts. Expired carts are removed from storage.
    #[instrument(skip(self))]
    pub fn get_all(&self) -> Vec<GuestCart> {
        self.load().into_carts()
    }

    /// The cart for one store, if it exists and has not expired.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub fn get_for_tenant(&self, store_id: StoreId) -> Option<GuestCart> {
        self.get_all()
            .into_iter()
            .find(|cart| cart.store_id == store_id)
    }

    /// Sum of quantities in one store's cart, 0 if there is none.
    #[must_use]
    pub fn item_count_for_tenant(&self, store_id: StoreId) -> u32 {
        self.load().item_count_for_tenant(store_id)
    }

    /// Sum of quantities across every store's cart.
    #[must_use]
    pub fn total_item_count(&self) -> u32 {
        self.load().total_item_count()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product to a store's cart, merging with an existing line.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub fn add_item(&self, store_id: StoreId, product_id: ProductId, quantity: u32) {
        self.mutate(|carts| carts.add_item(store_id, product_id, quantity, Utc::now()));
    }

    /// Overwrite a line's quantity. Zero removes the line.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub fn update_item_quantity(&self, store_id: StoreId, product_id: ProductId, quantity: u32) {
        self.mutate(|carts| carts.set_quantity(store_id, product_id, quantity, Utc::now()));
    }

    /// Subtract `quantity` from a line, removing it when nothing is left.
    ///
    /// Returns `false` if storage could not be read or the result could not be
    /// written, in which case the line is still there.
    #[must_use]
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub fn try_deduct_item(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> bool {
        self.mutate(|carts| carts.deduct(store_id, product_id, quantity, Utc::now()))
    }

    /// Remove a line from a store's cart.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub fn remove_item(&self, store_id: StoreId, product_id: ProductId) {
        self.mutate(|carts| carts.remove_item(store_id, product_id, Utc::now()));
    }

    /// Remove a store's cart regardless of contents.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub fn clear_tenant(&self, store_id: StoreId) {
        self.mutate(|carts| carts.remove_tenant(store_id));
    }

    /// Remove every guest cart for every store.
    #[instrument(skip(self))]
    pub fn clear_all(&self) {
        if let Err(e) = self.storage.remove_item(&self.key) {
            warn!(error = %e, "Failed to clear guest carts");
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Read, repair, and prune the collection, writing it back if pruning removed anything.
    fn load(&self) -> GuestCartCollection {
        self.try_load().unwrap_or_else(|e| {
            warn!(error = %e, "Guest cart storage unreadable, treating as empty");
            GuestCartCollection::new()
        })
    }

    fn try_load(&self) -> Result<GuestCartCollection, StorageError> {
        let mut carts = self.read()?;
        let pruned = carts.prune_expired(Utc::now(), self.ttl);
        if pruned > 0 {
            debug!(pruned, "Pruned expired guest carts");
            self.save(&carts);
        }
        Ok(carts)
    }

    /// Malformed state reads as empty; only storage failures are errors.
    fn read(&self) -> Result<GuestCartCollection, StorageError> {
        let Some(raw) = self.storage.get_item(&self.key)? else {
            return Ok(GuestCartCollection::new());
        };

        match serde_json::from_str::<GuestCartCollection>(&raw) {
            Ok(mut carts) => {
                let repairs = carts.sanitize();
                if repairs > 0 {
                    warn!(repairs, "Repaired invalid guest cart state");
                }
                Ok(carts)
            }
            Err(e) => {
                warn!(error = %e, "Malformed guest cart state, treating as empty");
                Ok(GuestCartCollection::new())
            }
        }
    }

    /// Write the collection back. Returns whether it was persisted.
    fn save(&self, carts: &GuestCartCollection) -> bool {
        let result = if carts.is_empty() {
            self.storage.remove_item(&self.key)
        } else {
            match serde_json::to_string(carts) {
                Ok(json) => self.storage.set_item(&self.key, &json),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize guest carts");
                    return false;
                }
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist guest carts");
                false
            }
        }
    }

    /// Load, apply, and save if `apply` changed anything.
    ///
    /// Returns whether storage now reflects the change.
    fn mutate(&self, apply: impl FnOnce(&mut GuestCartCollection) -> bool) -> bool {
        let (mut carts, readable) = match self.try_load() {
            Ok(carts) => (carts, true),
            Err(e) => {
                warn!(error = %e, "Guest cart storage unreadable, treating as empty");
                (GuestCartCollection::new(), false)
            }
        };
        if apply(&mut carts) {
            self.save(&carts) && readable
        } else {
            readable
        }
    }
}
