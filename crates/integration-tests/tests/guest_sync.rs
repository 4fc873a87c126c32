//! Integration tests for migrating guest carts on sign-in.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use axum::http::StatusCode;
use plug_cart::{GUEST_CART_STORAGE_KEY, LocalStorage, SyncError};
use plug_core::{ProductId, SessionStatus, StoreId, SyncState};
use plug_integration_tests::MockBackend;

#[tokio::test]
async fn test_guest_checkout_then_sign_in() {
    let backend = MockBackend::start().await.unwrap();
    let cart = backend.subsystem(SessionStatus::Anonymous).unwrap();
    let store = StoreId::new(7);

    cart.facade().add(store, ProductId::new(42), 1).await.unwrap();
    cart.facade().add(store, ProductId::new(43), 2).await.unwrap();
    assert_eq!(cart.facade().item_count(store).await.unwrap(), 3);
    assert!(backend.requests().is_empty());

    cart.session().sign_in();
    let report = cart.reconciler().sync(store).await.unwrap();

    assert_eq!(report.synced, 2);
    assert!(report.is_complete());
    assert_eq!(backend.count("POST", "/cart/7/items"), 2);
    assert!(cart.guest().get_for_tenant(store).is_none());
    assert_eq!(
        cart.guest().storage().get_item(GUEST_CART_STORAGE_KEY).unwrap(),
        None
    );
    assert_eq!(cart.facade().item_count(store).await.unwrap(), 3);
    assert_eq!(cart.reconciler().state(store), SyncState::Synced);
}

#[tokio::test]
async fn test_sync_merges_into_existing_server_cart() {
    let backend = MockBackend::start().await.unwrap();
    let cart = backend.subsystem(SessionStatus::Anonymous).unwrap();
    let store = StoreId::new(7);
    backend.seed(store, ProductId::new(42), 2);

    cart.facade().add(store, ProductId::new(42), 1).await.unwrap();
    cart.session().sign_in();
    cart.reconciler().sync(store).await.unwrap();

    let server = backend.cart(store).unwrap();
    assert_eq!(server.items.len(), 1);
    assert_eq!(server.total_quantity(), 3);
}

#[tokio::test]
async fn test_partial_failure_keeps_only_failed_lines() {
    let backend = MockBackend::start().await.unwrap();
    backend.reject_product(
        ProductId::new(43),
        StatusCode::UNPROCESSABLE_ENTITY,
        "Product is no longer available",
    );
    let cart = backend.subsystem(SessionStatus::Anonymous).unwrap();
    let store = StoreId::new(7);
    cart.facade().add(store, ProductId::new(42), 1).await.unwrap();
    cart.facade().add(store, ProductId::new(43), 2).await.unwrap();

    cart.session().sign_in();
    let report = cart.reconciler().sync(store).await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].product_id, ProductId::new(43));
    assert_eq!(report.failed[0].reason, "Product is no longer available");

    let guest = cart.guest().get_for_tenant(store).unwrap();
    assert_eq!(guest.items.len(), 1);
    assert_eq!(guest.items[0].product_id, ProductId::new(43));
    assert_eq!(guest.items[0].quantity, 2);
    assert_eq!(
        cart.reconciler().state(store),
        SyncState::PartiallySynced { failed: 1 }
    );

    let server = backend.cart(store).unwrap();
    assert_eq!(server.items.len(), 1);
    assert_eq!(server.items[0].product_id, ProductId::new(42));
}

#[tokio::test]
async fn test_empty_sync_sends_nothing() {
    let backend = MockBackend::start().await.unwrap();
    let cart = backend.subsystem(SessionStatus::Authenticated).unwrap();

    let report = cart.reconciler().sync(StoreId::new(7)).await.unwrap();

    assert_eq!(report.synced, 0);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_sync_requires_sign_in() {
    let backend = MockBackend::start().await.unwrap();
    let cart = backend.subsystem(SessionStatus::Anonymous).unwrap();
    cart.facade()
        .add(StoreId::new(7), ProductId::new(42), 1)
        .await
        .unwrap();

    let err = cart.reconciler().sync_all().await.unwrap_err();

    assert!(matches!(err, SyncError::NotAuthenticated));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_sign_in_triggers_sync_for_every_store() {
    let backend = MockBackend::start().await.unwrap();
    let cart = backend.subsystem(SessionStatus::Anonymous).unwrap();
    cart.facade()
        .add(StoreId::new(1), ProductId::new(10), 1)
        .await
        .unwrap();
    cart.facade()
        .add(StoreId::new(2), ProductId::new(20), 2)
        .await
        .unwrap();

    let watcher = cart.spawn_login_sync();
    cart.session().sign_in();

    tokio::time::timeout(Duration::from_secs(5), async {
        while cart.guest().total_item_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(backend.cart(StoreId::new(1)).unwrap().total_quantity(), 1);
    assert_eq!(backend.cart(StoreId::new(2)).unwrap().total_quantity(), 2);
    watcher.abort();
}
