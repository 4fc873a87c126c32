//! CLI error type.

use plug_cart::{ApiError, CartError, ConfigError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cart API error: {0}")]
    Api(#[from] ApiError),

    #[error("{}", .0.user_message())]
    Cart(#[from] CartError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    /// Server carts are per store; there is no "show everything" read.
    #[error("Pass --store <ID> to show a server cart")]
    StoreRequired,

    /// `sync` needs exactly one of `--store` and `--all`.
    #[error("Pass --store <ID> or --all")]
    MissingTarget,
}
