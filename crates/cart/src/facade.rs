//! Session-aware cart façade.
//!
//! Callers use one cart API regardless of whether the shopper is signed in.
//! Every call asks the [`SessionProvider`] once and routes to exactly one
//! backend:
//!
//! - anonymous: the [`GuestCartStore`], synchronously, followed by a
//!   [`CartEvent::GuestCartUpdated`](crate::events::CartEvent::GuestCartUpdated)
//! - authenticated: the [`CartApi`], followed on success by
//!   [`CartEvent::CartInvalidated`](crate::events::CartEvent::CartInvalidated)
//!   and a success notification, or on failure by an error notification
//!
//! The two stores are never mixed within one operation.

use tracing::{error, info, instrument};

use plug_core::{AddToCartInput, CartItemId, ProductId, StoreId, UpdateCartItemInput};

use crate::api::{ApiError, CartApi};
use crate::error::CartError;
use crate::events::{CartEvents, Notification};
use crate::guest::GuestCartStore;
use crate::session::SessionProvider;
use crate::storage::LocalStorage;
use crate::telemetry;

/// Reference to a cart line as the caller knows it.
///
/// Guest lines are addressed by product; server lines need the server-issued
/// `item_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef {
    pub product_id: ProductId,
    pub item_id: Option<CartItemId>,
}

impl LineRef {
    /// A line known only by product (guest carts, or stale UI state).
    #[must_use]
    pub const fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            item_id: None,
        }
    }

    /// A server line with its item ID.
    #[must_use]
    pub const fn item(product_id: ProductId, item_id: CartItemId) -> Self {
        Self {
            product_id,
            item_id: Some(item_id),
        }
    }
}

/// The backing store chosen for one operation.
#[derive(Debug)]
pub enum CartBackend<'a, A, S> {
    /// Guest cart in local storage.
    Local(&'a GuestCartStore<S>),
    /// Server-side cart behind the API.
    Remote(&'a A),
}

/// Single entry point for cart operations.
#[derive(Debug)]
pub struct CartFacade<A, S, P> {
    guest: GuestCartStore<S>,
    api: A,
    session: P,
    events: CartEvents,
}

impl<A, S, P> CartFacade<A, S, P>
where
    A: CartApi,
    S: LocalStorage,
    P: SessionProvider,
{
    pub const fn new(guest: GuestCartStore<S>, api: A, session: P, events: CartEvents) -> Self {
        Self {
            guest,
            api,
            session,
            events,
        }
    }

    /// Pick the backend for the current session state.
    pub fn backend(&self) -> CartBackend<'_, A, S> {
        if self.session.is_authenticated() {
            CartBackend::Remote(&self.api)
        } else {
            CartBackend::Local(&self.guest)
        }
    }

    pub const fn guest(&self) -> &GuestCartStore<S> {
        &self.guest
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    pub const fn events(&self) -> &CartEvents {
        &self.events
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Add `quantity` of a product to the store's cart.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for a zero quantity, or the API error on the
    /// authenticated path.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn add(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        telemetry::add_breadcrumb(
            "cart",
            "Add to cart",
            &[
                ("store_id", store_id.to_string()),
                ("product_id", product_id.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );

        match self.backend() {
            CartBackend::Local(guest) => {
                guest.add_item(store_id, product_id, quantity);
                self.events.guest_cart_updated(store_id);
                Ok(())
            }
            CartBackend::Remote(api) => {
                let result = api
                    .add_to_cart(
                        store_id,
                        AddToCartInput {
                            product_id,
                            quantity,
                        },
                    )
                    .await;
                self.settle(store_id, result, "Added to cart").map(|_| ())
            }
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` when authenticated and `line` has no item ID, or
    /// the API error on the authenticated path.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %line.product_id))]
    pub async fn update_quantity(
        &self,
        store_id: StoreId,
        line: LineRef,
        quantity: u32,
    ) -> Result<(), CartError> {
        telemetry::add_breadcrumb(
            "cart",
            "Update cart quantity",
            &[
                ("store_id", store_id.to_string()),
                ("product_id", line.product_id.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );

        match self.backend() {
            CartBackend::Local(guest) => {
                guest.update_item_quantity(store_id, line.product_id, quantity);
                self.events.guest_cart_updated(store_id);
                Ok(())
            }
            CartBackend::Remote(api) => {
                let item_id = Self::require_item_id(store_id, line)?;
                if quantity == 0 {
                    let result = api.remove_from_cart(item_id).await;
                    return self.settle(store_id, result, "Removed from cart");
                }
                let result = api
                    .update_cart_item(item_id, UpdateCartItemInput { quantity })
                    .await;
                self.settle(store_id, result, "Cart updated").map(|_| ())
            }
        }
    }

    /// Remove a line from the store's cart.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` when authenticated and `line` has no item ID, or
    /// the API error on the authenticated path.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %line.product_id))]
    pub async fn remove(&self, store_id: StoreId, line: LineRef) -> Result<(), CartError> {
        telemetry::add_breadcrumb(
            "cart",
            "Remove from cart",
            &[
                ("store_id", store_id.to_string()),
                ("product_id", line.product_id.to_string()),
            ],
        );

        match self.backend() {
            CartBackend::Local(guest) => {
                guest.remove_item(store_id, line.product_id);
                self.events.guest_cart_updated(store_id);
                Ok(())
            }
            CartBackend::Remote(api) => {
                let item_id = Self::require_item_id(store_id, line)?;
                let result = api.remove_from_cart(item_id).await;
                self.settle(store_id, result, "Removed from cart")
            }
        }
    }

    /// Empty the store's cart.
    ///
    /// On the authenticated path the server cart ID is resolved through a cart
    /// read; a cart the backend does not know about is already empty.
    ///
    /// # Errors
    ///
    /// Returns the API error on the authenticated path.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn clear(&self, store_id: StoreId) -> Result<(), CartError> {
        telemetry::add_breadcrumb("cart", "Clear cart", &[("store_id", store_id.to_string())]);

        match self.backend() {
            CartBackend::Local(guest) => {
                guest.clear_tenant(store_id);
                self.events.guest_cart_updated(store_id);
                Ok(())
            }
            CartBackend::Remote(api) => {
                let cart = match api.get_cart(store_id).await {
                    Ok(cart) => cart,
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return self.settle(store_id, Err(e), ""),
                };
                if cart.items.is_empty() {
                    return Ok(());
                }
                let result = api.clear_cart(cart.id).await;
                self.settle(store_id, result, "Cart cleared")
            }
        }
    }

    /// Number of units in the store's cart.
    ///
    /// # Errors
    ///
    /// Returns the API error on the authenticated path. No notification is
    /// emitted for failed reads.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn item_count(&self, store_id: StoreId) -> Result<u32, CartError> {
        match self.backend() {
            CartBackend::Local(guest) => Ok(guest.item_count_for_tenant(store_id)),
            CartBackend::Remote(api) => match api.get_cart(store_id).await {
                Ok(cart) => Ok(cart.total_quantity()),
                Err(e) if e.is_not_found() => Ok(0),
                Err(e) => Err(e.into()),
            },
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_item_id(store_id: StoreId, line: LineRef) -> Result<CartItemId, CartError> {
        line.item_id.ok_or(CartError::ItemNotFound {
            store_id,
            product_id: line.product_id,
        })
    }

    /// Turn an API result into events and a façade result.
    fn settle<T>(
        &self,
        store_id: StoreId,
        result: Result<T, ApiError>,
        success_message: &str,
    ) -> Result<T, CartError> {
        match result {
            Ok(value) => {
                info!(%store_id, "{success_message}");
                self.events.cart_invalidated(store_id);
                self.events.notify(Notification::success(success_message));
                Ok(value)
            }
            Err(e) => {
                error!(%store_id, error = %e, "Cart operation failed");
                telemetry::capture_api_error(&e);
                self.events.notify(Notification::error(e.user_message()));
                Err(e.into())
            }
        }
    }
}
