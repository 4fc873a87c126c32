//! FindYourPlug Core - Shared types library.
//!
//! This crate provides the types shared by every FindYourPlug cart component:
//! - `cart` - Guest cart store, authenticated cart client, façade, and sync
//! - `cli` - Command-line driver for the cart subsystem
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O, no
//! storage access, no HTTP clients. Every operation that depends on the current
//! time takes it as an argument, so the rules here are deterministic.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, session status, and cart records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
