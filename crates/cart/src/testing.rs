//! In-memory `CartApi` used by unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use plug_core::{
    AddToCartInput, AuthenticatedCart, AuthenticatedCartItem, CartId, CartItemId, ProductId,
    StoreId, UpdateCartItemInput,
};

use crate::api::{ApiError, CartApi};

/// A call as seen by [`RecordingApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Get(StoreId),
    Add(StoreId, ProductId, u32),
    Update(CartItemId, u32),
    Remove(CartItemId),
    Clear(CartId),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ApiCall>,
    carts: HashMap<StoreId, AuthenticatedCart>,
    rejections: HashMap<ProductId, String>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn locate(&self, item_id: CartItemId) -> Option<StoreId> {
        self.carts
            .iter()
            .find(|(_, cart)| cart.items.iter().any(|item| item.item_id == item_id))
            .map(|(store_id, _)| *store_id)
    }
}

/// Records every call and keeps server carts in memory.
#[derive(Debug, Default)]
pub struct RecordingApi {
    state: Mutex<State>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

fn not_found(what: &str) -> ApiError {
    ApiError::Rejected {
        status: 404,
        message: format!("{what} not found"),
    }
}

impl RecordingApi {
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn add_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::Add(..)))
            .count()
    }

    /// Fail every add of `product_id` with a 422 carrying `message`.
    pub fn reject_product(&self, product_id: ProductId, message: &str) {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(product_id, message.to_string());
    }

    /// Hold every add until [`RecordingApi::resume`].
    pub fn pause(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn resume(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    pub fn cart(&self, store_id: StoreId) -> Option<AuthenticatedCart> {
        self.state.lock().unwrap().carts.get(&store_id).cloned()
    }

    pub fn cart_id(&self, store_id: StoreId) -> Option<CartId> {
        self.cart(store_id).map(|cart| cart.id)
    }

    pub fn item_for(&self, store_id: StoreId, product_id: ProductId) -> Option<CartItemId> {
        self.cart(store_id)?
            .item_for_product(product_id)
            .map(|item| item.item_id)
    }
}

impl CartApi for RecordingApi {
    async fn get_cart(&self, store_id: StoreId) -> Result<AuthenticatedCart, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Get(store_id));
        state
            .carts
            .get(&store_id)
            .cloned()
            .ok_or_else(|| not_found("Cart"))
    }

    async fn add_to_cart(
        &self,
        store_id: StoreId,
        input: AddToCartInput,
    ) -> Result<AuthenticatedCartItem, ApiError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // Closed on resume
            let _ = gate.acquire().await;
        }

        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(ApiCall::Add(store_id, input.product_id, input.quantity));

        if let Some(message) = state.rejections.get(&input.product_id) {
            return Err(ApiError::Rejected {
                status: 422,
                message: message.clone(),
            });
        }

        if !state.carts.contains_key(&store_id) {
            let id = CartId::new(state.next_id());
            state.carts.insert(
                store_id,
                AuthenticatedCart {
                    id,
                    store_id,
                    items: Vec::new(),
                },
            );
        }
        let item_id = CartItemId::new(state.next_id());
        let cart = state.carts.get_mut(&store_id).unwrap();

        if let Some(item) = cart
            .items
            .iter_mut()
            .find(|item| item.product_id == input.product_id)
        {
            item.quantity += input.quantity;
            return Ok(item.clone());
        }

        let item = AuthenticatedCartItem {
            item_id,
            product_id: input.product_id,
            quantity: input.quantity,
            store_id,
            unit_price: None,
        };
        cart.items.push(item.clone());
        Ok(item)
    }

    async fn update_cart_item(
        &self,
        item_id: CartItemId,
        input: UpdateCartItemInput,
    ) -> Result<AuthenticatedCartItem, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Update(item_id, input.quantity));
        let store_id = state.locate(item_id).ok_or_else(|| not_found("Cart item"))?;
        let cart = state.carts.get_mut(&store_id).unwrap();
        let item = cart
            .items
            .iter_mut()
            .find(|item| item.item_id == item_id)
            .unwrap();
        item.quantity = input.quantity;
        Ok(item.clone())
    }

    async fn remove_from_cart(&self, item_id: CartItemId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Remove(item_id));
        let store_id = state.locate(item_id).ok_or_else(|| not_found("Cart item"))?;
        let cart = state.carts.get_mut(&store_id).unwrap();
        cart.items.retain(|item| item.item_id != item_id);
        Ok(())
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Clear(cart_id));
        let cart = state
            .carts
            .values_mut()
            .find(|cart| cart.id == cart_id)
            .ok_or_else(|| not_found("Cart"))?;
        cart.items.clear();
        Ok(())
    }
}
