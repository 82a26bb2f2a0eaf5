//! Stock service client.
//!
//! # Architecture
//!
//! - The stock service is the source of truth for inventory and catalog data
//! - Stock levels are always fetched fresh; they gate every quantity change
//! - Product metadata is cached in memory via `moka` (5 minute TTL by default)
//!
//! # Endpoints
//!
//! - `GET /stock/{id}` - `{"id": 42, "amount": 5}`
//! - `GET /products/{id}` - `{"id": 42, "title": "...", "price": 179.9, "image": "..."}`

mod client;

pub use client::HttpStockService;

use std::sync::Arc;

use async_trait::async_trait;
use storefront_cart_core::{ProductDetails, ProductId, StockInfo};
use thiserror::Error;

/// Errors that can occur when querying the stock service.
#[derive(Debug, Error)]
pub enum StockError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service does not know the product.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// The service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Read-only access to inventory levels and product metadata.
#[async_trait]
pub trait StockService: Send + Sync {
    /// Current stock level for a product.
    async fn stock(&self, product_id: ProductId) -> Result<StockInfo, StockError>;

    /// Catalog metadata for a product.
    async fn product(&self, product_id: ProductId) -> Result<ProductDetails, StockError>;
}

#[async_trait]
impl<T> StockService for Arc<T>
where
    T: StockService + ?Sized,
{
    async fn stock(&self, product_id: ProductId) -> Result<StockInfo, StockError> {
        (**self).stock(product_id).await
    }

    async fn product(&self, product_id: ProductId) -> Result<ProductDetails, StockError> {
        (**self).product(product_id).await
    }
}
