//! FindYourPlug cart CLI.
//!
//! Drives the cart subsystem from a terminal: guest carts are kept in a local
//! file, and with `FYP_API_TOKEN` set every command goes to the signed-in
//! shopper's server cart instead.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 42 to store 7's cart
//! fyp-cart add --store 7 --product 42 --quantity 2
//!
//! # Show the cart
//! fyp-cart show --store 7
//!
//! # Work on the guest cart even when a token is configured
//! fyp-cart --guest count --store 7
//!
//! # After signing in, move every guest cart into the account
//! fyp-cart sync --all
//! ```
//!
//! # Commands
//!
//! - `add`, `update`, `remove`, `clear` - Modify a store's cart
//! - `count`, `show` - Inspect carts
//! - `sync` - Migrate guest carts into the signed-in account

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plug_cart::{CartConfig, CartSubsystem, SessionHandle};
use plug_core::{CartItemId, ProductId, SessionStatus, StoreId};

mod commands;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "fyp-cart")]
#[command(author, version, about = "FindYourPlug cart tools")]
struct Cli {
    /// Use the guest cart even if an API token is configured
    #[arg(long, global = true)]
    guest: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a product to a store's cart
    Add {
        #[arg(short, long)]
        store: StoreId,

        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a cart line (0 removes it)
    Update {
        #[arg(short, long)]
        store: StoreId,

        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long)]
        quantity: u32,

        /// Server cart item ID; looked up from the cart when omitted
        #[arg(long)]
        item: Option<CartItemId>,
    },
    /// Remove a line from a store's cart
    Remove {
        #[arg(short, long)]
        store: StoreId,

        #[arg(short, long)]
        product: ProductId,

        /// Server cart item ID; looked up from the cart when omitted
        #[arg(long)]
        item: Option<CartItemId>,
    },
    /// Empty a store's cart
    Clear {
        #[arg(short, long)]
        store: StoreId,
    },
    /// Print the number of units in a store's cart
    Count {
        #[arg(short, long)]
        store: StoreId,
    },
    /// Print cart contents
    Show {
        /// Store to show; every guest cart when omitted
        #[arg(short, long)]
        store: Option<StoreId>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Move guest carts into the signed-in account
    Sync {
        #[arg(short, long, conflicts_with = "all")]
        store: Option<StoreId>,

        /// Sync every store that has a guest cart
        #[arg(long)]
        all: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "plug_cart=info,plug_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), CliError> {
    let status = if config.has_token() && !cli.guest {
        SessionStatus::Authenticated
    } else {
        SessionStatus::Anonymous
    };
    tracing::debug!(%status, "Session resolved");

    let cart = CartSubsystem::new(config, SessionHandle::new(status))?;
    let mut events = cart.events().subscribe();

    let result = match cli.command {
        Commands::Add {
            store,
            product,
            quantity,
        } => commands::cart::add(&cart, store, product, quantity).await,
        Commands::Update {
            store,
            product,
            quantity,
            item,
        } => commands::cart::update(&cart, store, product, item, quantity).await,
        Commands::Remove {
            store,
            product,
            item,
        } => commands::cart::remove(&cart, store, product, item).await,
        Commands::Clear { store } => commands::cart::clear(&cart, store).await,
        Commands::Count { store } => commands::cart::count(&cart, store).await,
        Commands::Show { store, json } => commands::cart::show(&cart, store, json).await,
        Commands::Sync { store, all } => match (store, all) {
            (Some(store), false) => commands::sync::one(&cart, store).await,
            (None, true) => commands::sync::all(&cart).await,
            _ => Err(CliError::MissingTarget),
        },
    };

    commands::notices::print(&mut events);
    result
}
