//! Authenticated cart API.
//!
//! # Architecture
//!
//! - [`CartApi`] is the capability the façade and reconciler depend on
//! - [`CartApiClient`] implements it over the backend's REST contract with `reqwest`
//! - The backend is the source of truth: no optimistic updates, no retries
//! - Cart reads are cached with `moka`; every confirmed mutation invalidates the
//!   owning store's cached cart
//!
//! # Endpoints
//!
//! | Operation            | Request                        |
//! |----------------------|--------------------------------|
//! | [`CartApi::get_cart`]         | `GET /cart/{storeId}`          |
//! | [`CartApi::add_to_cart`]      | `POST /cart/{storeId}/items`   |
//! | [`CartApi::update_cart_item`] | `PATCH /cart/items/{itemId}`   |
//! | [`CartApi::remove_from_cart`] | `DELETE /cart/items/{itemId}`  |
//! | [`CartApi::clear_cart`]       | `DELETE /cart/{cartId}`        |

mod cache;
mod client;

pub use client::CartApiClient;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use plug_core::{
    AddToCartInput, AuthenticatedCart, AuthenticatedCartItem, CartId, CartItemId, StoreId,
    UpdateCartItemInput,
};

/// Errors that can occur when talking to the cart API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (connection, DNS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    ///
    /// `message` is the backend's human-readable `message` field when present.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request could not be built (bad base URL, bad token header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Message suitable for showing to the shopper.
    ///
    /// Backend rejections are surfaced verbatim; transport failures get a
    /// generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::RateLimited(_) => "Too many requests, please try again shortly".to_string(),
            Self::Http(_) | Self::Parse(_) | Self::InvalidRequest(_) => {
                "Could not reach the store, please try again".to_string()
            }
        }
    }

    /// Whether the backend reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Rejected { status: 404, .. })
    }
}

/// Cart operations for a signed-in shopper.
///
/// The current user is resolved by the backend from the request credentials.
pub trait CartApi: Send + Sync {
    /// Fetch the user's cart for a store.
    fn get_cart(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<AuthenticatedCart, ApiError>> + Send;

    /// Add a product to the user's cart for a store.
    fn add_to_cart(
        &self,
        store_id: StoreId,
        input: AddToCartInput,
    ) -> impl Future<Output = Result<AuthenticatedCartItem, ApiError>> + Send;

    /// Change the quantity of a cart line.
    fn update_cart_item(
        &self,
        item_id: CartItemId,
        input: UpdateCartItemInput,
    ) -> impl Future<Output = Result<AuthenticatedCartItem, ApiError>> + Send;

    /// Remove a cart line.
    fn remove_from_cart(
        &self,
        item_id: CartItemId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove every line of a cart.
    fn clear_cart(&self, cart_id: CartId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: CartApi> CartApi for Arc<T> {
    fn get_cart(
        &self,
        store_id: StoreId,
    ) -> impl Future<Output = Result<AuthenticatedCart, ApiError>> + Send {
        (**self).get_cart(store_id)
    }

    fn add_to_cart(
        &self,
        store_id: StoreId,
        input: AddToCartInput,
    ) -> impl Future<Output = Result<AuthenticatedCartItem, ApiError>> + Send {
        (**self).add_to_cart(store_id, input)
    }

    fn update_cart_item(
        &self,
        item_id: CartItemId,
        input: UpdateCartItemInput,
    ) -> impl Future<Output = Result<AuthenticatedCartItem, ApiError>> + Send {
        (**self).update_cart_item(item_id, input)
    }

    fn remove_from_cart(
        &self,
        item_id: CartItemId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).remove_from_cart(item_id)
    }

    fn clear_cart(&self, cart_id: CartId) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).clear_cart(cart_id)
    }
}
