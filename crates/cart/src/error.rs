//! Error types for cart operations and guest cart migration.

use thiserror::Error;

use plug_core::{ProductId, StoreId};

use crate::api::ApiError;

/// Errors returned by the cart façade.
///
/// Guest-path operations never fail on storage problems; those are swallowed
/// by the guest cart store. Only validation and authenticated-path failures
/// surface here.
#[derive(Debug, Error)]
pub enum CartError {
    /// An authenticated update or remove had no server-side item ID to target.
    #[error("Cart item not found: product {product_id} in store {store_id}")]
    ItemNotFound {
        store_id: StoreId,
        product_id: ProductId,
    },

    /// Items must be added with a positive quantity.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The backend rejected the operation or could not be reached.
    #[error("Cart API error: {0}")]
    Api(#[from] ApiError),
}

impl CartError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ItemNotFound { .. } => {
                "That item is no longer in your cart, please refresh".to_string()
            }
            Self::InvalidQuantity => self.to_string(),
            Self::Api(err) => err.user_message(),
        }
    }
}

/// Errors returned by the sync reconciler.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Guest items can only be migrated into a signed-in account.
    #[error("Cannot sync guest cart without an authenticated session")]
    NotAuthenticated,

    /// Another migration for the same store is still running.
    #[error("Guest cart sync already in progress for store {0}")]
    AlreadySyncing(StoreId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::ItemNotFound {
            store_id: StoreId::new(7),
            product_id: ProductId::new(42),
        };
        assert_eq!(
            err.to_string(),
            "Cart item not found: product 42 in store 7"
        );
    }

    #[test]
    fn test_api_rejection_user_message_is_verbatim() {
        let err = CartError::from(ApiError::Rejected {
            status: 409,
            message: "This store is closed".to_string(),
        });
        assert_eq!(err.user_message(), "This store is closed");
    }

    #[test]
    fn test_sync_error_display() {
        assert_eq!(
            SyncError::AlreadySyncing(StoreId::new(3)).to_string(),
            "Guest cart sync already in progress for store 3"
        );
    }
}
