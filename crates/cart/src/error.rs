//! Cart error handling with Sentry integration.
//!
//! Every store operation returns `Result<_, CartError>`. At the operation
//! boundary the store also turns each failure into a [`Notice`] for the
//! shopper and reports unexpected failures to Sentry before returning.

use storefront_cart_core::{ProductId, SnapshotError};
use thiserror::Error;

use crate::stock::StockError;
use crate::storage::StorageError;

/// Shown whenever a quantity check against the stock service fails.
pub const OUT_OF_STOCK_MESSAGE: &str = "requested quantity exceeds available stock";

/// Error type for cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The requested quantity is above the available stock.
    #[error(
        "Out of stock: requested {requested} of product {product_id}, only {available} available"
    )]
    OutOfStock {
        product_id: ProductId,
        requested: u64,
        available: u32,
    },

    /// The product is not in the cart.
    #[error("Not found: product {0} is not in the cart")]
    NotFound(ProductId),

    /// The stock service lookup failed (network error or unknown product).
    #[error("Stock lookup failed: {0}")]
    LookupFailed(#[from] StockError),

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The persisted cart could not be decoded.
    #[error("Corrupt cart state: {0}")]
    CorruptState(#[from] SnapshotError),

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Whether this failure points at a broken dependency rather than a
    /// shopper action.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::LookupFailed(_) | Self::CorruptState(_) | Self::Storage(_)
        )
    }

    /// Build the shopper-facing notice for this failure.
    #[must_use]
    pub fn notice(&self, operation: Operation, product_id: Option<ProductId>) -> Notice {
        let message = match self {
            Self::OutOfStock { .. } => OUT_OF_STOCK_MESSAGE,
            _ => operation.failure_message(),
        };
        Notice {
            operation,
            product_id,
            message: message.to_string(),
        }
    }

    /// Log the failure, capturing unexpected ones to Sentry.
    pub(crate) fn report(&self, operation: Operation, product_id: Option<ProductId>) {
        if self.is_unexpected() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                operation = %operation,
                product_id = ?product_id,
                sentry_event_id = %event_id,
                "Cart operation failed"
            );
        } else {
            tracing::warn!(
                error = %self,
                operation = %operation,
                product_id = ?product_id,
                "Cart operation rejected"
            );
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// The store operation a notice or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    AddProduct,
    RemoveProduct,
    UpdateProductAmount,
    Clear,
}

impl Operation {
    /// Generic message shown when the operation fails for a reason other
    /// than stock.
    #[must_use]
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::Open => "failed to load cart",
            Self::AddProduct => "failed to add product",
            Self::RemoveProduct => "failed to remove product",
            Self::UpdateProductAmount => "failed to update product quantity",
            Self::Clear => "failed to clear cart",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::AddProduct => write!(f, "add_product"),
            Self::RemoveProduct => write!(f, "remove_product"),
            Self::UpdateProductAmount => write!(f, "update_product_amount"),
            Self::Clear => write!(f, "clear"),
        }
    }
}

/// A user-facing failure notification (a toast in the storefront UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub operation: Operation,
    pub product_id: Option<ProductId>,
    pub message: String,
}

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes leading up to an error.
pub fn add_breadcrumb(operation: Operation, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(format!("cart.{operation}")),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String(value.clone()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
