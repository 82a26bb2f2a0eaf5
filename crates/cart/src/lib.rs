//! Storefront cart library.
//!
//! A [`CartStore`] tracks the products a shopper has selected, mirrors the
//! cart to a [`PersistentKv`] backend on every change, and validates
//! quantities against a [`StockService`].
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_cart::{CartConfig, CartStore, FileKv, HttpStockService, StoreOptions};
//!
//! let config = CartConfig::from_env()?;
//! let stock = HttpStockService::new(&config.stock)?;
//! let kv = FileKv::new(&config.storage_dir);
//! let store = CartStore::open(stock, kv, StoreOptions::from(&config)).await?;
//!
//! store.add_product(ProductId::new(42)).await?;
//! println!("{} items", store.snapshot().total_quantity());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod stock;
pub mod storage;
pub mod view;

pub use cart::{CartStore, StoreOptions};
pub use config::{CartConfig, ConfigError, StockApiConfig};
pub use error::{CartError, Notice, Operation};
pub use stock::{HttpStockService, StockError, StockService};
pub use storage::{FileKv, MemoryKv, PersistentKv, StorageError};
pub use view::{CartItemView, CartView};

pub use storefront_cart_core::{
    CartSnapshot, CurrencyCode, LineItem, MAX_UNIT_PRICE, Price, ProductDetails, ProductId,
    SnapshotError, StockInfo,
};
