//! Cache types for cart API responses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use plug_core::{AuthenticatedCart, CartId, CartItemId, StoreId};

/// Server-side resource whose owning store is remembered for invalidation.
///
/// Update and remove calls only carry an item or cart ID; the ownership index
/// maps those back to the store whose cached cart must be dropped.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum OwnedResource {
    Item(CartItemId),
    Cart(CartId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Cart(Box<AuthenticatedCart>),
}

/// Invalidation counters for cached carts.
///
/// Every invalidation bumps the store's counter, or the shared epoch when all
/// carts are dropped. A cart read may only stay cached if the generation it
/// observed before the request is still current after it is stored.
#[derive(Debug, Default)]
pub struct Generations {
    epoch: AtomicU64,
    stores: Mutex<HashMap<StoreId, u64>>,
}

/// Snapshot of [`Generations`] for one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    store: u64,
}

impl Generations {
    pub fn current(&self, store_id: StoreId) -> Generation {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let store = self.lock().get(&store_id).copied().unwrap_or_default();
        Generation { epoch, store }
    }

    pub fn bump(&self, store_id: StoreId) {
        let mut stores = self.lock();
        let counter = stores.entry(store_id).or_default();
        *counter = counter.wrapping_add(1);
    }

    pub fn bump_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StoreId, u64>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_changes_on_store_bump() {
        let generations = Generations::default();
        let before = generations.current(StoreId::new(1));

        generations.bump(StoreId::new(2));
        assert_eq!(generations.current(StoreId::new(1)), before);

        generations.bump(StoreId::new(1));
        assert_ne!(generations.current(StoreId::new(1)), before);
    }

    #[test]
    fn test_generation_changes_on_bump_all() {
        let generations = Generations::default();
        let before = generations.current(StoreId::new(1));

        generations.bump_all();

        assert_ne!(generations.current(StoreId::new(1)), before);
    }
}
