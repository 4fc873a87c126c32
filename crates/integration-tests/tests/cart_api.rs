//! Integration tests for the authenticated cart REST client.
//!
//! These run the real `reqwest` client against the in-process mock backend.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::http::StatusCode;
use plug_cart::{ApiError, CartApi, CartApiClient};
use plug_core::{
    AddToCartInput, CurrencyCode, Price, ProductId, StoreId, UpdateCartItemInput,
};
use plug_integration_tests::{MockBackend, TEST_TOKEN};
use rust_decimal::Decimal;

async fn client() -> (MockBackend, CartApiClient) {
    let backend = MockBackend::start().await.unwrap();
    let client = CartApiClient::new(&backend.api_config(true)).unwrap();
    (backend, client)
}

fn add(product: i64, quantity: u32) -> AddToCartInput {
    AddToCartInput {
        product_id: ProductId::new(product),
        quantity,
    }
}

// =============================================================================
// Contract
// =============================================================================

#[tokio::test]
async fn test_add_then_read_cart() {
    let (_backend, client) = client().await;
    let store = StoreId::new(7);

    let item = client.add_to_cart(store, add(42, 1)).await.unwrap();
    assert_eq!(item.product_id, ProductId::new(42));
    assert_eq!(item.store_id, store);

    let cart = client.get_cart(store).await.unwrap();
    assert_eq!(cart.store_id, store);
    assert_eq!(cart.total_quantity(), 1);
    assert_eq!(cart.item_for_product(ProductId::new(42)).unwrap().item_id, item.item_id);
}

#[tokio::test]
async fn test_update_and_remove_line() {
    let (backend, client) = client().await;
    let store = StoreId::new(3);
    let item_id = backend.seed(store, ProductId::new(5), 1);

    let updated = client
        .update_cart_item(item_id, UpdateCartItemInput { quantity: 4 })
        .await
        .unwrap();
    assert_eq!(updated.quantity, 4);

    client.remove_from_cart(item_id).await.unwrap();
    assert!(backend.cart(store).unwrap().items.is_empty());
}

#[tokio::test]
async fn test_clear_cart() {
    let (backend, client) = client().await;
    let store = StoreId::new(3);
    backend.seed(store, ProductId::new(5), 1);
    backend.seed(store, ProductId::new(6), 2);
    let cart_id = backend.cart(store).unwrap().id;

    client.clear_cart(cart_id).await.unwrap();

    assert!(backend.cart(store).unwrap().items.is_empty());
    assert_eq!(backend.count("DELETE", &format!("/cart/{cart_id}")), 1);
}

#[tokio::test]
async fn test_priced_subtotal() {
    let (backend, client) = client().await;
    let store = StoreId::new(1);
    backend.set_price(
        ProductId::new(10),
        Price::new(Decimal::new(150_000, 2), CurrencyCode::NGN),
    );
    backend.seed(store, ProductId::new(10), 2);

    let cart = client.get_cart(store).await.unwrap();

    assert_eq!(cart.subtotal().amount, Decimal::new(300_000, 2));
    assert_eq!(cart.subtotal().display(), "₦3000.00");
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_rejection_message_is_verbatim() {
    let (backend, client) = client().await;
    backend.reject_product(
        ProductId::new(42),
        StatusCode::UNPROCESSABLE_ENTITY,
        "Only 1 unit left in stock",
    );

    let err = client
        .add_to_cart(StoreId::new(7), add(42, 5))
        .await
        .unwrap_err();

    match err {
        ApiError::Rejected { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Only 1 unit left in stock");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_cart_is_not_found() {
    let (_backend, client) = client().await;

    let err = client.get_cart(StoreId::new(404)).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.user_message(), "Cart not found");
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after() {
    let (backend, client) = client().await;
    backend.rate_limit(Some(30));

    let err = client.get_cart(StoreId::new(1)).await.unwrap_err();

    assert!(matches!(err, ApiError::RateLimited(30)));
}

#[tokio::test]
async fn test_missing_token_is_rejected_by_backend() {
    let backend = MockBackend::start().await.unwrap();
    let client = CartApiClient::new(&backend.api_config(false)).unwrap();

    let err = client.get_cart(StoreId::new(1)).await.unwrap_err();

    assert!(matches!(err, ApiError::Rejected { status: 401, .. }));
}

// =============================================================================
// Headers
// =============================================================================

#[tokio::test]
async fn test_requests_carry_bearer_and_unique_request_ids() {
    let (backend, client) = client().await;
    client.add_to_cart(StoreId::new(1), add(1, 1)).await.unwrap();
    client.add_to_cart(StoreId::new(1), add(2, 1)).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);

    let expected = format!("Bearer {TEST_TOKEN}");
    for request in &requests {
        assert_eq!(request.authorization.as_deref(), Some(expected.as_str()));
        let id = request.request_id.as_deref().unwrap();
        assert_eq!(uuid::Uuid::parse_str(id).unwrap().get_version_num(), 4);
    }
    assert_ne!(requests[0].request_id, requests[1].request_id);
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_cart_reads_are_cached() {
    let (backend, client) = client().await;
    let store = StoreId::new(2);
    backend.seed(store, ProductId::new(1), 1);

    client.get_cart(store).await.unwrap();
    client.get_cart(store).await.unwrap();

    assert_eq!(backend.count("GET", "/cart/2"), 1);
    assert!(client.cached_cart(store).await.is_some());
}

#[tokio::test]
async fn test_mutations_invalidate_cached_cart() {
    let (backend, client) = client().await;
    let store = StoreId::new(2);

    client.add_to_cart(store, add(1, 1)).await.unwrap();
    let cart = client.get_cart(store).await.unwrap();
    assert_eq!(cart.total_quantity(), 1);

    client.add_to_cart(store, add(1, 2)).await.unwrap();
    assert!(client.cached_cart(store).await.is_none());
    let cart = client.get_cart(store).await.unwrap();
    assert_eq!(cart.total_quantity(), 3);

    let item_id = cart.item_for_product(ProductId::new(1)).unwrap().item_id;
    client.remove_from_cart(item_id).await.unwrap();
    assert!(client.cached_cart(store).await.is_none());
    assert!(client.get_cart(store).await.unwrap().items.is_empty());

    assert_eq!(backend.count("GET", "/cart/2"), 3);
}

#[tokio::test]
async fn test_clear_invalidates_cached_cart() {
    let (backend, client) = client().await;
    let store = StoreId::new(2);
    backend.seed(store, ProductId::new(1), 1);

    let cart = client.get_cart(store).await.unwrap();
    client.clear_cart(cart.id).await.unwrap();

    assert!(client.cached_cart(store).await.is_none());
    assert!(client.get_cart(store).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_read_overlapping_add_is_not_cached() {
    let (backend, client) = client().await;
    let store = StoreId::new(7);
    backend.seed(store, ProductId::new(42), 1);
    backend.delay_reads(Some(Duration::from_millis(300)));

    let slow_read = tokio::spawn({
        let client = client.clone();
        async move { client.get_cart(store).await }
    });
    while backend.reads_started() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    client.add_to_cart(store, add(42, 1)).await.unwrap();
    assert_eq!(backend.cart(store).unwrap().total_quantity(), 2);

    let stale = slow_read.await.unwrap().unwrap();
    assert_eq!(stale.total_quantity(), 1);
    assert!(client.cached_cart(store).await.is_none());

    backend.delay_reads(None);
    assert_eq!(client.get_cart(store).await.unwrap().total_quantity(), 2);
}

#[tokio::test]
async fn test_clear_after_overlapping_read_reaches_backend() {
    let (backend, client) = client().await;
    let store = StoreId::new(7);
    backend.seed(store, ProductId::new(1), 1);
    let cart_id = backend.cart(store).unwrap().id;
    backend.delay_reads(Some(Duration::from_millis(300)));

    let slow_read = tokio::spawn({
        let client = client.clone();
        async move { client.get_cart(store).await }
    });
    while backend.reads_started() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    client.clear_cart(cart_id).await.unwrap();
    slow_read.await.unwrap().unwrap();

    backend.delay_reads(None);
    assert!(client.get_cart(store).await.unwrap().items.is_empty());
    assert_eq!(backend.count("GET", "/cart/7"), 2);
}
