//! FindYourPlug cart subsystem.
//!
//! Shopping cart state for a multi-tenant marketplace, for both anonymous
//! visitors and signed-in shoppers:
//!
//! - [`guest`] - per-store guest carts persisted in local storage, expiring
//!   after 7 days of inactivity
//! - [`api`] - the authenticated cart REST client
//! - [`facade`] - one cart API that routes each call by session state
//! - [`sync`] - migration of guest carts into the account on sign-in
//!
//! [`CartSubsystem`] wires all of them to one storage backend, API client,
//! session, and event channel.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod guest;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use api::{ApiError, CartApi, CartApiClient};
pub use config::{CartApiConfig, CartConfig, ConfigError, GuestCartConfig};
pub use error::{CartError, SyncError};
pub use events::{CartEvent, CartEvents, Notification, NotificationLevel};
pub use facade::{CartBackend, CartFacade, LineRef};
pub use guest::{GUEST_CART_STORAGE_KEY, GuestCartStore};
pub use session::{SessionHandle, SessionProvider};
pub use state::{Cart, CartSubsystem, CartSync, SharedStorage};
pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
pub use sync::{FailedSyncItem, SyncReconciler, SyncReport};
