//! Cart line items, stock levels and the cart snapshot.
//!
//! A [`CartSnapshot`] is an ordered list of [`LineItem`]s, unique by product.
//! Snapshots are persisted as a JSON array with camelCase field names:
//!
//! ```json
//! [{"productId":42,"title":"Tenis Runner","unitPrice":179.9,"imageUrl":"https://...","quantity":1}]
//! ```
//!
//! Blobs written by the legacy storefront used `id`, `price`, `image` and
//! `amount`; those names are accepted as aliases when decoding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;

/// Errors produced when decoding or validating a cart snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The stored blob is not valid snapshot JSON.
    #[error("malformed cart data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// More than one line item for the same product.
    #[error("duplicate line item for product {0}")]
    DuplicateProduct(ProductId),

    /// A line item with a quantity below one.
    #[error("line item for product {0} has zero quantity")]
    ZeroQuantity(ProductId),

    /// A line item priced below zero.
    #[error("line item for product {0} has a negative price")]
    NegativePrice(ProductId),

    /// A line item priced above [`MAX_UNIT_PRICE`].
    #[error("line item for product {0} has a price above {max}", max = MAX_UNIT_PRICE)]
    PriceTooLarge(ProductId),
}

/// Largest accepted unit price.
///
/// Keeps `unit_price * quantity` summed over a cart far inside `Decimal`'s range.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// One product in the cart together with its requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    pub title: String,
    #[serde(alias = "price", with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
    #[serde(alias = "image")]
    pub image_url: String,
    /// Always at least one inside a [`CartSnapshot`].
    #[serde(alias = "amount")]
    pub quantity: u32,
}

impl LineItem {
    /// Build a line item from catalog metadata.
    #[must_use]
    pub fn from_details(details: ProductDetails, quantity: u32) -> Self {
        Self {
            product_id: details.product_id,
            title: details.title,
            unit_price: details.unit_price,
            image_url: details.image_url,
            quantity,
        }
    }

    /// Unit price multiplied by quantity, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Stock level reported by the stock service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    #[serde(alias = "amount")]
    pub available_quantity: u32,
}

/// Catalog metadata for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    pub title: String,
    #[serde(alias = "price", with = "rust_decimal::serde::arbitrary_precision")]
    pub unit_price: Decimal,
    #[serde(alias = "image")]
    pub image_url: String,
}

/// Point-in-time view of the cart contents.
///
/// Insertion order is preserved. Every constructor and mutator keeps the
/// snapshot unique by product with quantities of at least one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartSnapshot {
    #[serde(deserialize_with = "deserialize_items")]
    items: Vec<LineItem>,
}

impl CartSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a snapshot from line items, validating them.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if a product appears twice, a quantity is zero
    /// or a price is out of range.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::new();
        for item in items {
            snapshot.insert(item)?;
        }
        Ok(snapshot)
    }

    /// Decode a persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` for invalid JSON and the matching
    /// validation error for structurally valid but inconsistent data.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let items: Vec<LineItem> = serde_json::from_str(json)?;
        Self::from_items(items)
    }

    /// Encode the snapshot for persistence.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.items)?)
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Iterate over the line items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up the line item for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// Quantity in the cart for a product, if present.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.get(product_id).map(|item| item.quantity)
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of all line totals, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(LineItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Append a new line item.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the product is already present, the quantity
    /// is zero, or the price is negative or above [`MAX_UNIT_PRICE`]. The
    /// snapshot is unchanged on error.
    pub fn insert(&mut self, item: LineItem) -> Result<(), SnapshotError> {
        if item.quantity == 0 {
            return Err(SnapshotError::ZeroQuantity(item.product_id));
        }
        if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
            return Err(SnapshotError::NegativePrice(item.product_id));
        }
        if item.unit_price > MAX_UNIT_PRICE {
            return Err(SnapshotError::PriceTooLarge(item.product_id));
        }
        if self.contains(item.product_id) {
            return Err(SnapshotError::DuplicateProduct(item.product_id));
        }
        self.items.push(item);
        Ok(())
    }

    /// Add one unit of a product already in the cart.
    ///
    /// Returns the new quantity, or `None` if the product is absent.
    pub fn increment(&mut self, product_id: ProductId) -> Option<u32> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)?;
        item.quantity = item.quantity.saturating_add(1);
        Some(item.quantity)
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// A quantity of zero removes the line item. Returns `false` if the
    /// product is absent.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id).is_some();
        }
        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product_id)
        {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a product, preserving the relative order of the rest.
    pub fn remove(&mut self, product_id: ProductId) -> Option<LineItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.product_id == product_id)?;
        Some(self.items.remove(index))
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn deserialize_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let items = Vec::<LineItem>::deserialize(deserializer)?;
    CartSnapshot::from_items(items)
        .map(|snapshot| snapshot.items)
        .map_err(serde::de::Error::custom)
}
