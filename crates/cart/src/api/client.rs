//! REST implementation of [`CartApi`].
//!
//! Uses `reqwest` for HTTP and caches cart reads with `moka`.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use plug_core::{
    AddToCartInput, AuthenticatedCart, AuthenticatedCartItem, CartId, CartItemId, StoreId,
    UpdateCartItemInput,
};

use super::cache::{CacheValue, Generations, OwnedResource};
use super::{ApiError, CartApi};
use crate::config::CartApiConfig;

/// Header carrying a per-request correlation ID.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest backend body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

// =============================================================================
// CartApiClient
// =============================================================================

/// Client for the backend cart API.
///
/// Cheap to clone; clones share the HTTP connection pool and caches.
#[derive(Clone)]
pub struct CartApiClient {
    inner: Arc<CartApiClientInner>,
}

struct CartApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    carts: Cache<StoreId, CacheValue>,
    generations: Generations,
    owners: Cache<OwnedResource, StoreId>,
}

impl std::fmt::Debug for CartApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl CartApiClient {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be used as a header value or the
    /// HTTP client fails to build.
    pub fn new(config: &CartApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid API token format: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let carts = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();
        let owners = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(Duration::from_secs(60 * 60))
            .build();

        Ok(Self {
            inner: Arc::new(CartApiClientInner {
                client,
                base_url,
                carts,
                generations: Generations::default(),
                owners,
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid URL for {path}: {e}")))
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request_id = Uuid::new_v4();
        let response = request
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            warn!(%request_id, retry_after, "Cart API rate limited");
            return Err(ApiError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = rejection_message(status, &body);
            warn!(
                %request_id,
                status = %status,
                message = %message,
                "Cart API rejected request"
            );
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(%request_id, status = %status, "Cart API request succeeded");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => Ok(envelope.into_inner()),
            Err(e) => {
                warn!(
                    error = %e,
                    body = %text.chars().take(500).collect::<String>(),
                    "Failed to parse cart API response"
                );
                Err(ApiError::Parse(e))
            }
        }
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// The cached cart for a store, if present.
    pub async fn cached_cart(&self, store_id: StoreId) -> Option<AuthenticatedCart> {
        match self.inner.carts.get(&store_id).await {
            Some(CacheValue::Cart(cart)) => Some(*cart),
            None => None,
        }
    }

    /// Drop the cached cart for a store.
    ///
    /// Reads already in flight for the store will not repopulate the cache.
    pub async fn invalidate_store(&self, store_id: StoreId) {
        self.inner.generations.bump(store_id);
        self.inner.carts.invalidate(&store_id).await;
    }

    /// Drop every cached cart.
    pub async fn invalidate_all(&self) {
        self.inner.generations.bump_all();
        self.inner.carts.invalidate_all();
        self.inner.carts.run_pending_tasks().await;
    }

    /// Invalidate the cart owning `resource`, or every cart when the owner is unknown.
    async fn invalidate_owner(&self, resource: OwnedResource) {
        match self.inner.owners.remove(&resource).await {
            Some(store_id) => self.invalidate_store(store_id).await,
            None => {
                debug!(?resource, "Owner unknown, invalidating all cached carts");
                self.invalidate_all().await;
            }
        }
    }

    async fn remember_owners(&self, cart: &AuthenticatedCart) {
        self.inner
            .owners
            .insert(OwnedResource::Cart(cart.id), cart.store_id)
            .await;
        for item in &cart.items {
            self.inner
                .owners
                .insert(OwnedResource::Item(item.item_id), cart.store_id)
                .await;
        }
    }
}

impl CartApi for CartApiClient {
    #[instrument(skip(self), fields(store_id = %store_id))]
    async fn get_cart(&self, store_id: StoreId) -> Result<AuthenticatedCart, ApiError> {
        if let Some(cart) = self.cached_cart(store_id).await {
            debug!("Cache hit for cart");
            return Ok(cart);
        }

        let generation = self.inner.generations.current(store_id);
        let url = self.url(&format!("cart/{store_id}"))?;
        let response = self.send(self.inner.client.get(url)).await?;
        let cart: AuthenticatedCart = Self::decode(response).await?;

        self.remember_owners(&cart).await;
        if self.inner.generations.current(store_id) != generation {
            debug!("Cart changed during read, not caching");
            return Ok(cart);
        }
        self.inner
            .carts
            .insert(store_id, CacheValue::Cart(Box::new(cart.clone())))
            .await;
        // A mutation may have landed between the check and the insert
        if self.inner.generations.current(store_id) != generation {
            self.inner.carts.invalidate(&store_id).await;
        }

        Ok(cart)
    }

    #[instrument(skip(self), fields(store_id = %store_id, product_id = %input.product_id))]
    async fn add_to_cart(
        &self,
        store_id: StoreId,
        input: AddToCartInput,
    ) -> Result<AuthenticatedCartItem, ApiError> {
        let url = self.url(&format!("cart/{store_id}/items"))?;
        let response = self.send(self.inner.client.post(url).json(&input)).await?;
        let item: AuthenticatedCartItem = Self::decode(response).await?;

        self.inner
            .owners
            .insert(OwnedResource::Item(item.item_id), store_id)
            .await;
        self.invalidate_store(store_id).await;

        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update_cart_item(
        &self,
        item_id: CartItemId,
        input: UpdateCartItemInput,
    ) -> Result<AuthenticatedCartItem, ApiError> {
        let url = self.url(&format!("cart/items/{item_id}"))?;
        let response = self.send(self.inner.client.patch(url).json(&input)).await?;
        let item: AuthenticatedCartItem = Self::decode(response).await?;

        self.inner
            .owners
            .insert(OwnedResource::Item(item.item_id), item.store_id)
            .await;
        self.invalidate_store(item.store_id).await;

        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove_from_cart(&self, item_id: CartItemId) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/items/{item_id}"))?;
        self.send(self.inner.client.delete(url)).await?;

        self.invalidate_owner(OwnedResource::Item(item_id)).await;
        Ok(())
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn clear_cart(&self, cart_id: CartId) -> Result<(), ApiError> {
        let url = self.url(&format!("cart/{cart_id}"))?;
        self.send(self.inner.client.delete(url)).await?;

        self.invalidate_owner(OwnedResource::Cart(cart_id)).await;
        Ok(())
    }
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Success bodies arrive either bare or wrapped in `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Backend error body.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Extract the human-readable message from a failure response.
fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
        && !message.trim().is_empty()
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('<') {
        return format!("Request failed with status {status}");
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
