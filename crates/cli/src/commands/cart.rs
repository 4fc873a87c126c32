//! Cart commands.
//!
//! Every command goes through the façade, so the same invocation edits the
//! guest cart file or the server cart depending on the session.

use tracing::info;

use plug_cart::{CartApi, CartError, CartSubsystem, LineRef, SessionProvider};
use plug_core::{AuthenticatedCart, CartItemId, GuestCart, ProductId, StoreId};

use crate::error::CliError;

/// Add a product to a store's cart.
///
/// # Errors
///
/// Returns an error if the quantity is zero or the backend rejects the add.
pub async fn add(
    cart: &CartSubsystem,
    store: StoreId,
    product: ProductId,
    quantity: u32,
) -> Result<(), CliError> {
    cart.facade().add(store, product, quantity).await?;
    info!(%store, %product, quantity, "Added to cart");
    count(cart, store).await
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns an error if the line cannot be resolved or the backend rejects the
/// update.
pub async fn update(
    cart: &CartSubsystem,
    store: StoreId,
    product: ProductId,
    item: Option<CartItemId>,
    quantity: u32,
) -> Result<(), CliError> {
    let line = resolve_line(cart, store, product, item).await?;
    cart.facade().update_quantity(store, line, quantity).await?;
    info!(%store, %product, quantity, "Cart updated");
    count(cart, store).await
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the line cannot be resolved or the backend rejects the
/// removal.
pub async fn remove(
    cart: &CartSubsystem,
    store: StoreId,
    product: ProductId,
    item: Option<CartItemId>,
) -> Result<(), CliError> {
    let line = resolve_line(cart, store, product, item).await?;
    cart.facade().remove(store, line).await?;
    info!(%store, %product, "Removed from cart");
    count(cart, store).await
}

/// Empty a store's cart.
///
/// # Errors
///
/// Returns an error if the backend rejects the clear.
pub async fn clear(cart: &CartSubsystem, store: StoreId) -> Result<(), CliError> {
    cart.facade().clear(store).await?;
    info!(%store, "Cart cleared");
    Ok(())
}

/// Print the number of units in a store's cart.
///
/// # Errors
///
/// Returns an error if the server cart cannot be read.
#[allow(clippy::print_stdout)]
pub async fn count(cart: &CartSubsystem, store: StoreId) -> Result<(), CliError> {
    let count = cart.facade().item_count(store).await?;
    println!("{count}");
    Ok(())
}

/// Print cart contents.
///
/// # Errors
///
/// Returns an error if the server cart cannot be read, or `StoreRequired` when
/// signed in without `--store`.
#[allow(clippy::print_stdout)]
pub async fn show(cart: &CartSubsystem, store: Option<StoreId>, json: bool) -> Result<(), CliError> {
    if cart.session().is_authenticated() {
        let store = store.ok_or(CliError::StoreRequired)?;
        let server_cart = match cart.api().get_cart(store).await {
            Ok(server_cart) => Some(server_cart),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&server_cart)?);
        } else {
            match server_cart {
                Some(server_cart) => print_server_cart(&server_cart),
                None => println!("Store {store}: cart is empty"),
            }
        }
        return Ok(());
    }

    let guest_carts: Vec<GuestCart> = match store {
        Some(store) => cart.guest().get_for_tenant(store).into_iter().collect(),
        None => cart.guest().get_all(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&guest_carts)?);
    } else if guest_carts.is_empty() {
        println!("No guest carts");
    } else {
        for guest_cart in &guest_carts {
            print_guest_cart(guest_cart);
        }
    }
    Ok(())
}

/// Fill in the server item ID for a product when signed in.
async fn resolve_line(
    cart: &CartSubsystem,
    store: StoreId,
    product: ProductId,
    item: Option<CartItemId>,
) -> Result<LineRef, CartError> {
    if item.is_some() || !cart.session().is_authenticated() {
        return Ok(LineRef {
            product_id: product,
            item_id: item,
        });
    }

    let item_id = match cart.api().get_cart(store).await {
        Ok(server_cart) => server_cart
            .item_for_product(product)
            .map(|line| line.item_id),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };
    Ok(LineRef {
        product_id: product,
        item_id,
    })
}

#[allow(clippy::print_stdout)]
fn print_server_cart(server_cart: &AuthenticatedCart) {
    println!(
        "Store {} (cart {}): {} units",
        server_cart.store_id,
        server_cart.id,
        server_cart.total_quantity()
    );
    for line in &server_cart.items {
        let price = line
            .unit_price
            .map_or_else(|| "-".to_string(), |price| price.display());
        println!(
            "  item {:<8} product {:<8} x{:<4} {price}",
            line.item_id, line.product_id, line.quantity
        );
    }
    println!("  subtotal {}", server_cart.subtotal().display());
}

#[allow(clippy::print_stdout)]
fn print_guest_cart(guest_cart: &GuestCart) {
    println!(
        "Store {} (guest, updated {}): {} units",
        guest_cart.store_id,
        guest_cart.updated_at.format("%Y-%m-%d %H:%M"),
        guest_cart.item_count()
    );
    for line in &guest_cart.items {
        println!("  product {:<8} x{}", line.product_id, line.quantity);
    }
}
