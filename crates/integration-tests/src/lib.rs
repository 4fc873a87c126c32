//! Integration tests for the FindYourPlug cart subsystem.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p plug-integration-tests
//! ```
//!
//! Each test starts a [`MockBackend`]: an in-process axum server on an
//! ephemeral port implementing the backend cart contract. The real
//! `reqwest` client, façade, and reconciler talk to it over HTTP.
//!
//! # Test Categories
//!
//! - `cart_api` - REST client behavior (errors, caching, headers)
//! - `cart_facade` - Session routing against a live backend
//! - `guest_sync` - Guest-to-account migration

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use plug_cart::{CartApiConfig, CartSubsystem, MemoryStorage, SessionHandle, SharedStorage};
use plug_core::{
    AddToCartInput, AuthenticatedCart, AuthenticatedCartItem, CartId, CartItemId, Price,
    ProductId, SessionStatus, StoreId, UpdateCartItemInput,
};

/// Token the mock backend accepts.
pub const TEST_TOKEN: &str = "fyp_test_9sK2mQ7xVb4LzR8w";

/// One request as received by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Default)]
struct Backend {
    carts: HashMap<StoreId, AuthenticatedCart>,
    prices: HashMap<ProductId, Price>,
    rejections: HashMap<ProductId, (StatusCode, String)>,
    rate_limit: Option<u64>,
    read_delay: Option<Duration>,
    reads_started: usize,
    requests: Vec<RecordedRequest>,
    next_id: i64,
}

impl Backend {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owner_of(&self, item_id: CartItemId) -> Option<StoreId> {
        self.carts
            .values()
            .find(|cart| cart.items.iter().any(|item| item.item_id == item_id))
            .map(|cart| cart.store_id)
    }

    fn add(&mut self, store_id: StoreId, input: AddToCartInput) -> AuthenticatedCartItem {
        let unit_price = self.prices.get(&input.product_id).copied();
        let cart_id = CartId::new(self.next_id());
        let item_id = CartItemId::new(self.next_id());
        let cart = self
            .carts
            .entry(store_id)
            .or_insert_with(|| AuthenticatedCart {
                id: cart_id,
                store_id,
                items: Vec::new(),
            });

        if let Some(item) = cart
            .items
            .iter_mut()
            .find(|item| item.product_id == input.product_id)
        {
            item.quantity += input.quantity;
            return item.clone();
        }

        let item = AuthenticatedCartItem {
            item_id,
            product_id: input.product_id,
            quantity: input.quantity,
            store_id,
            unit_price,
        };
        cart.items.push(item.clone());
        item
    }
}

type Shared = Arc<Mutex<Backend>>;

fn lock(state: &Shared) -> MutexGuard<'_, Backend> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process backend implementing the cart REST contract.
pub struct MockBackend {
    base_url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let app = router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/api/v1"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    /// Base URL the cart client should be pointed at.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Client configuration for this backend, with or without the test token.
    #[must_use]
    pub fn api_config(&self, authenticated: bool) -> CartApiConfig {
        CartApiConfig {
            base_url: self.base_url(),
            token: authenticated.then(|| SecretString::from(TEST_TOKEN)),
            cache_ttl: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    /// A cart subsystem wired to this backend over in-memory guest storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn subsystem(&self, status: SessionStatus) -> Result<CartSubsystem, plug_cart::ApiError> {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        CartSubsystem::with_storage(
            &self.api_config(true),
            chrono::Duration::days(7),
            storage,
            SessionHandle::new(status),
        )
    }

    /// Refuse every add of `product_id` with `status` and `message`.
    pub fn reject_product(&self, product_id: ProductId, status: StatusCode, message: &str) {
        lock(&self.state)
            .rejections
            .insert(product_id, (status, message.to_string()));
    }

    /// Attach a unit price to every new line of `product_id`.
    pub fn set_price(&self, product_id: ProductId, price: Price) {
        lock(&self.state).prices.insert(product_id, price);
    }

    /// Answer every request with 429 and `Retry-After: seconds`.
    pub fn rate_limit(&self, seconds: Option<u64>) {
        lock(&self.state).rate_limit = seconds;
    }

    /// Hold every cart read for `delay` after its response has been built.
    ///
    /// The response reflects the cart as it was when the read arrived.
    pub fn delay_reads(&self, delay: Option<Duration>) {
        lock(&self.state).read_delay = delay;
    }

    /// Cart reads whose response has been built so far.
    #[must_use]
    pub fn reads_started(&self) -> usize {
        lock(&self.state).reads_started
    }

    /// Put a line into a shopper's server cart directly.
    pub fn seed(&self, store_id: StoreId, product_id: ProductId, quantity: u32) -> CartItemId {
        lock(&self.state)
            .add(
                store_id,
                AddToCartInput {
                    product_id,
                    quantity,
                },
            )
            .item_id
    }

    /// The server cart for a store as the backend holds it.
    #[must_use]
    pub fn cart(&self, store_id: StoreId) -> Option<AuthenticatedCart> {
        lock(&self.state).carts.get(&store_id).cloned()
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests matching `method` whose path ends with `suffix`.
    #[must_use]
    pub fn count(&self, method: &str, suffix: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/cart/{id}", get(get_cart).delete(clear_cart))
        .route("/cart/{id}/items", post(add_item))
        .route(
            "/cart/items/{item_id}",
            patch(update_item).delete(remove_item),
        )
        .layer(middleware::from_fn_with_state(Arc::clone(&state), guard))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Record the request, then apply rate limiting and bearer authentication.
async fn guard(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let authorization = header_value(request.headers(), header::AUTHORIZATION.as_str());
    let rate_limit = {
        let mut backend = lock(&state);
        backend.requests.push(RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            request_id: header_value(request.headers(), "x-request-id"),
            authorization: authorization.clone(),
        });
        backend.rate_limit
    };

    if let Some(seconds) = rate_limit {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, seconds.to_string())],
            "slow down",
        )
            .into_response();
    }
    let expected = format!("Bearer {TEST_TOKEN}");
    if authorization.as_deref() != Some(expected.as_str()) {
        return failure(StatusCode::UNAUTHORIZED, "Authentication required");
    }

    next.run(request).await
}

async fn get_cart(State(state): State<Shared>, Path(store_id): Path<i64>) -> Response {
    let (response, delay) = {
        let mut backend = lock(&state);
        let response = match backend.carts.get(&StoreId::new(store_id)) {
            Some(cart) => Json(json!({ "data": cart })).into_response(),
            None => failure(StatusCode::NOT_FOUND, "Cart not found"),
        };
        backend.reads_started += 1;
        (response, backend.read_delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response
}

async fn add_item(
    State(state): State<Shared>,
    Path(store_id): Path<i64>,
    Json(input): Json<AddToCartInput>,
) -> Response {
    let mut backend = lock(&state);
    if let Some((status, message)) = backend.rejections.get(&input.product_id) {
        return failure(*status, message);
    }
    if input.quantity == 0 {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "Quantity must be at least 1");
    }
    let item = backend.add(StoreId::new(store_id), input);
    (StatusCode::CREATED, Json(item)).into_response()
}

async fn update_item(
    State(state): State<Shared>,
    Path(item_id): Path<i64>,
    Json(input): Json<UpdateCartItemInput>,
) -> Response {
    let item_id = CartItemId::new(item_id);
    let mut backend = lock(&state);
    let Some(store_id) = backend.owner_of(item_id) else {
        return failure(StatusCode::NOT_FOUND, "Cart item not found");
    };
    let item = backend
        .carts
        .get_mut(&store_id)
        .and_then(|cart| cart.items.iter_mut().find(|item| item.item_id == item_id));
    match item {
        Some(item) => {
            item.quantity = input.quantity;
            Json(json!({ "data": item })).into_response()
        }
        None => failure(StatusCode::NOT_FOUND, "Cart item not found"),
    }
}

async fn remove_item(State(state): State<Shared>, Path(item_id): Path<i64>) -> Response {
    let item_id = CartItemId::new(item_id);
    let mut backend = lock(&state);
    let Some(store_id) = backend.owner_of(item_id) else {
        return failure(StatusCode::NOT_FOUND, "Cart item not found");
    };
    if let Some(cart) = backend.carts.get_mut(&store_id) {
        cart.items.retain(|item| item.item_id != item_id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(state): State<Shared>, Path(cart_id): Path<i64>) -> Response {
    let cart_id = CartId::new(cart_id);
    let mut backend = lock(&state);
    match backend.carts.values_mut().find(|cart| cart.id == cart_id) {
        Some(cart) => {
            cart.items.clear();
            StatusCode::NO_CONTENT.into_response()
        }
        None => failure(StatusCode::NOT_FOUND, "Cart not found"),
    }
}
