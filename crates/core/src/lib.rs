//! Storefront Cart Core - Shared types library.
//!
//! This crate provides the types shared by every storefront cart component:
//! - `storefront-cart` - The cart store, stock service client and storage backends
//! - `storefront-cart-cli` - Command-line driver for a file-backed cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, line items and cart snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
