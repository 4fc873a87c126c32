//! Core types for FindYourPlug.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod status;

pub use cart::*;
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
