//! Core types for the storefront cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;

pub use cart::{CartSnapshot, LineItem, MAX_UNIT_PRICE, ProductDetails, SnapshotError, StockInfo};
pub use id::*;
pub use price::{CurrencyCode, Price};
