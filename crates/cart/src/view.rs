//! Display projections of the cart.
//!
//! Front-ends render these instead of the raw snapshot: prices come
//! pre-formatted in the store's currency.

use serde::Serialize;
use storefront_cart_core::{CartSnapshot, CurrencyCode, LineItem, Price};

/// Cart item display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub product_id: i32,
    pub title: String,
    pub image_url: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
    /// ISO code of the currency prices are formatted in.
    pub currency: &'static str,
}

impl CartView {
    /// Project a snapshot, formatting prices in `currency`.
    #[must_use]
    pub fn new(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        Self {
            items: snapshot
                .iter()
                .map(|line| CartItemView::new(line, currency))
                .collect(),
            subtotal: Price::new(snapshot.subtotal(), currency).display(),
            item_count: snapshot.total_quantity(),
            currency: currency.code(),
        }
    }
}

impl CartItemView {
    fn new(line: &LineItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: line.product_id.as_i32(),
            title: line.title.clone(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            price: Price::new(line.unit_price, currency).display(),
            line_price: Price::new(line.line_total(), currency).display(),
        }
    }
}
