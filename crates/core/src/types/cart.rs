//! Cart records for the guest (local) and authenticated (server) carts.
//!
//! The guest cart types carry the pure state transitions used by the guest
//! cart store. Every mutation takes `now` explicitly and keeps these invariants:
//!
//! - at most one [`GuestCart`] per store in a [`GuestCartCollection`]
//! - at most one [`GuestCartItem`] per `(store_id, product_id)`
//! - every item has `quantity > 0`
//! - a cart with no items is removed from the collection, never kept empty

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartId, CartItemId, ProductId, StoreId};
use super::price::{CurrencyCode, Price};

/// Default inactivity window after which a guest cart expires.
pub const GUEST_CART_TTL_DAYS: i64 = 7;

// =============================================================================
// Guest Cart
// =============================================================================

/// A line item in a guest cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub store_id: StoreId,
    pub added_at: DateTime<Utc>,
}

/// The guest cart for a single store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCart {
    pub store_id: StoreId,
    /// Line items in insertion order.
    pub items: Vec<GuestCartItem>,
    pub updated_at: DateTime<Utc>,
}

impl GuestCart {
    fn new(store_id: StoreId, now: DateTime<Utc>) -> Self {
        Self {
            store_id,
            items: Vec::new(),
            updated_at: now,
        }
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Find the line for a product.
    #[must_use]
    pub fn item(&self, product_id: ProductId) -> Option<&GuestCartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Whether the cart has been inactive for longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.updated_at) > ttl
    }
}

/// Every guest cart the visitor has touched, across all stores.
///
/// Serialized as a JSON array of [`GuestCart`] records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestCartCollection {
    carts: Vec<GuestCart>,
}

impl GuestCartCollection {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { carts: Vec::new() }
    }

    /// All carts in the collection.
    #[must_use]
    pub fn carts(&self) -> &[GuestCart] {
        &self.carts
    }

    /// Consume the collection, returning its carts.
    #[must_use]
    pub fn into_carts(self) -> Vec<GuestCart> {
        self.carts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    /// The cart for a store, if one exists.
    #[must_use]
    pub fn tenant(&self, store_id: StoreId) -> Option<&GuestCart> {
        self.carts.iter().find(|cart| cart.store_id == store_id)
    }

    fn tenant_mut(&mut self, store_id: StoreId) -> Option<&mut GuestCart> {
        self.carts.iter_mut().find(|cart| cart.store_id == store_id)
    }

    /// Sum of quantities in one store's cart, 0 if there is none.
    #[must_use]
    pub fn item_count_for_tenant(&self, store_id: StoreId) -> u32 {
        self.tenant(store_id).map_or(0, GuestCart::item_count)
    }

    /// Sum of quantities across every store's cart.
    #[must_use]
    pub fn total_item_count(&self) -> u32 {
        self.carts
            .iter()
            .fold(0u32, |acc, cart| acc.saturating_add(cart.item_count()))
    }

    /// Remove carts inactive for longer than `ttl`. Returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.carts.len();
        self.carts.retain(|cart| !cart.is_expired(now, ttl));
        before - self.carts.len()
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// A zero quantity leaves the collection untouched. Returns whether anything changed.
    pub fn add_item(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if quantity == 0 {
            return false;
        }

        if self.tenant(store_id).is_none() {
            self.carts.push(GuestCart::new(store_id, now));
        }
        let Some(cart) = self.tenant_mut(store_id) else {
            return false;
        };

        match cart
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => cart.items.push(GuestCartItem {
                product_id,
                quantity,
                store_id,
                added_at: now,
            }),
        }
        cart.updated_at = now;
        true
    }

    /// Overwrite a line's quantity; zero removes the line.
    ///
    /// Unknown lines are ignored. Returns whether anything changed.
    pub fn set_quantity(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if quantity == 0 {
            return self.remove_item(store_id, product_id, now);
        }

        let Some(cart) = self.tenant_mut(store_id) else {
            return false;
        };
        let Some(item) = cart
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        else {
            return false;
        };
        item.quantity = quantity;
        cart.updated_at = now;
        true
    }

    /// Subtract `quantity` from a line, removing it when nothing is left.
    ///
    /// Returns whether anything changed.
    pub fn deduct(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(current) = self
            .tenant(store_id)
            .and_then(|cart| cart.item(product_id))
            .map(|item| item.quantity)
        else {
            return false;
        };
        self.set_quantity(
            store_id,
            product_id,
            current.saturating_sub(quantity),
            now,
        )
    }

    /// Remove a line. A cart left without items is removed as well.
    ///
    /// Returns whether anything changed.
    pub fn remove_item(
        &mut self,
        store_id: StoreId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(cart) = self.tenant_mut(store_id) else {
            return false;
        };
        let before = cart.items.len();
        cart.items.retain(|item| item.product_id != product_id);
        if cart.items.len() == before {
            return false;
        }
        cart.updated_at = now;

        if cart.items.is_empty() {
            self.remove_tenant(store_id);
        }
        true
    }

    /// Remove a store's cart regardless of contents. Returns whether it existed.
    pub fn remove_tenant(&mut self, store_id: StoreId) -> bool {
        let before = self.carts.len();
        self.carts.retain(|cart| cart.store_id != store_id);
        self.carts.len() != before
    }

    /// Repair a collection read back from storage.
    ///
    /// Drops zero-quantity lines and lines whose `store_id` disagrees with their
    /// cart, merges duplicate lines and duplicate carts, and removes empty carts.
    /// Returns the number of repairs made.
    pub fn sanitize(&mut self) -> usize {
        let mut repairs = 0;
        let mut merged: Vec<GuestCart> = Vec::with_capacity(self.carts.len());

        for cart in std::mem::take(&mut self.carts) {
            let store_id = cart.store_id;
            let index = if let Some(index) = merged.iter().position(|c| c.store_id == store_id) {
                repairs += 1;
                index
            } else {
                merged.push(GuestCart::new(store_id, cart.updated_at));
                merged.len() - 1
            };
            let Some(target) = merged.get_mut(index) else {
                continue;
            };
            target.updated_at = target.updated_at.max(cart.updated_at);

            for item in cart.items {
                if item.quantity == 0 || item.store_id != store_id {
                    repairs += 1;
                    continue;
                }
                match target
                    .items
                    .iter_mut()
                    .find(|existing| existing.product_id == item.product_id)
                {
                    Some(existing) => {
                        repairs += 1;
                        existing.quantity = existing.quantity.saturating_add(item.quantity);
                        existing.added_at = existing.added_at.min(item.added_at);
                    }
                    None => target.items.push(item),
                }
            }
        }

        let before = merged.len();
        merged.retain(|cart| !cart.items.is_empty());
        repairs += before - merged.len();

        self.carts = merged;
        repairs
    }
}

// =============================================================================
// Authenticated Cart
// =============================================================================

/// A line item in the server-side cart of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedCartItem {
    /// Server-issued line identity, required for update and remove.
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub store_id: StoreId,
    /// Unit price, when the backend includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Price>,
}

/// The server-side cart of a signed-in user for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedCart {
    pub id: CartId,
    pub store_id: StoreId,
    #[serde(default)]
    pub items: Vec<AuthenticatedCartItem>,
}

impl AuthenticatedCart {
    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Find the server line for a product.
    #[must_use]
    pub fn item_for_product(&self, product_id: ProductId) -> Option<&AuthenticatedCartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Subtotal of priced lines.
    ///
    /// Lines without a price are skipped. The currency is taken from the first
    /// priced line.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let currency = self
            .items
            .iter()
            .find_map(|item| item.unit_price.map(|p| p.currency_code))
            .unwrap_or(CurrencyCode::NGN);
        let amount = self
            .items
            .iter()
            .filter_map(|item| item.unit_price.map(|p| p.times(item.quantity).amount))
            .fold(Decimal::ZERO, |acc, line| acc + line);
        Price::new(amount, currency)
    }
}

/// Body of an add-to-cart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of an update-quantity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemInput {
    pub quantity: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn ts(days_ago: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days_ago)
    }

    const STORE: StoreId = StoreId::new(1);
    const OTHER_STORE: StoreId = StoreId::new(2);
    const PRODUCT: ProductId = ProductId::new(100);

    #[test]
    fn test_add_item_accumulates_quantity() {
        let mut carts = GuestCartCollection::new();
        let now = Utc::now();
        assert!(carts.add_item(STORE, PRODUCT, 2, now));
        assert!(carts.add_item(STORE, PRODUCT, 3, now));

        let cart = carts.tenant(STORE).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
    }

    #[test]
    fn test_add_item_zero_is_noop() {
        let mut carts = GuestCartCollection::new();
        assert!(!carts.add_item(STORE, PRODUCT, 0, Utc::now()));
        assert!(carts.is_empty());
    }

    #[test]
    fn test_add_item_preserves_insertion_order_and_added_at() {
        let mut carts = GuestCartCollection::new();
        let first = ts(2);
        let later = ts(1);
        carts.add_item(STORE, ProductId::new(3), 1, first);
        carts.add_item(STORE, ProductId::new(1), 1, first);
        carts.add_item(STORE, ProductId::new(3), 1, later);

        let cart = carts.tenant(STORE).unwrap();
        let order: Vec<i64> = cart.items.iter().map(|i| i.product_id.as_i64()).collect();
        assert_eq!(order, vec![3, 1]);
        assert_eq!(cart.items[0].added_at, first);
        assert_eq!(cart.updated_at, later);
    }

    #[test]
    fn test_tenant_isolation() {
        let mut carts = GuestCartCollection::new();
        let now = Utc::now();
        carts.add_item(STORE, PRODUCT, 2, now);
        carts.add_item(OTHER_STORE, PRODUCT, 3, now);

        assert_eq!(carts.item_count_for_tenant(STORE), 2);
        assert_eq!(carts.item_count_for_tenant(OTHER_STORE), 3);
        assert_eq!(carts.total_item_count(), 5);
    }

    #[test]
    fn test_set_quantity_zero_removes_last_item_and_cart() {
        let mut carts = GuestCartCollection::new();
        let now = Utc::now();
        carts.add_item(STORE, PRODUCT, 2, now);
        carts.add_item(OTHER_STORE, PRODUCT, 1, now);

        assert!(carts.set_quantity(STORE, PRODUCT, 0, now));
        assert!(carts.tenant(STORE).is_none());
        assert!(carts.tenant(OTHER_STORE).is_some());
    }

    #[test]
    fn test_set_quantity_unknown_item_is_noop() {
        let mut carts = GuestCartCollection::new();
        assert!(!carts.set_quantity(STORE, PRODUCT, 4, Utc::now()));
        assert!(carts.is_empty());
    }

    #[test]
    fn test_deduct_partial_and_full() {
        let mut carts = GuestCartCollection::new();
        let now = Utc::now();
        carts.add_item(STORE, PRODUCT, 5, now);

        assert!(carts.deduct(STORE, PRODUCT, 2, now));
        assert_eq!(carts.item_count_for_tenant(STORE), 3);

        assert!(carts.deduct(STORE, PRODUCT, 3, now));
        assert!(carts.tenant(STORE).is_none());
    }

    #[test]
    fn test_prune_expired() {
        let mut carts = GuestCartCollection::new();
        carts.add_item(STORE, PRODUCT, 1, ts(8));
        carts.add_item(OTHER_STORE, PRODUCT, 1, ts(1));

        let removed = carts.prune_expired(Utc::now(), Duration::days(GUEST_CART_TTL_DAYS));
        assert_eq!(removed, 1);
        assert!(carts.tenant(STORE).is_none());
        assert!(carts.tenant(OTHER_STORE).is_some());
    }

    #[test]
    fn test_sanitize_repairs_invalid_state() {
        let now = Utc::now();
        let json = serde_json::json!([
            {
                "storeId": 1,
                "updatedAt": now,
                "items": [
                    { "productId": 100, "quantity": 1, "storeId": 1, "addedAt": now },
                    { "productId": 100, "quantity": 2, "storeId": 1, "addedAt": now },
                    { "productId": 101, "quantity": 0, "storeId": 1, "addedAt": now },
                    { "productId": 102, "quantity": 4, "storeId": 9, "addedAt": now }
                ]
            },
            { "storeId": 1, "updatedAt": now, "items": [
                { "productId": 103, "quantity": 1, "storeId": 1, "addedAt": now }
            ]},
            { "storeId": 2, "updatedAt": now, "items": [] }
        ]);
        let mut carts: GuestCartCollection = serde_json::from_value(json).unwrap();

        let repairs = carts.sanitize();
        assert_eq!(repairs, 5);
        assert_eq!(carts.carts().len(), 1);
        let cart = carts.tenant(STORE).unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item(PRODUCT).unwrap().quantity, 3);
        assert!(cart.item(ProductId::new(103)).is_some());
    }

    #[test]
    fn test_authenticated_cart_totals() {
        let cart = AuthenticatedCart {
            id: CartId::new(1),
            store_id: STORE,
            items: vec![
                AuthenticatedCartItem {
                    item_id: CartItemId::new(10),
                    product_id: PRODUCT,
                    quantity: 2,
                    store_id: STORE,
                    unit_price: Some(Price::from_minor_units(50_000, CurrencyCode::NGN)),
                },
                AuthenticatedCartItem {
                    item_id: CartItemId::new(11),
                    product_id: ProductId::new(101),
                    quantity: 1,
                    store_id: STORE,
                    unit_price: None,
                },
            ],
        };

        assert_eq!(cart.total_quantity(), 3);
        assert_eq!(cart.subtotal().amount, Decimal::from(1000));
        assert_eq!(
            cart.item_for_product(PRODUCT).map(|i| i.item_id),
            Some(CartItemId::new(10))
        );
    }
}
