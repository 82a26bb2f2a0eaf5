//! The cart store.
//!
//! [`CartStore`] owns the in-memory cart for one shopping session. Every
//! mutating operation runs under a per-store async mutex and performs a full
//! read-modify-write cycle: stock lookups first, then a fresh read of the
//! persisted cart, then the change, the write, and finally a publish to
//! subscribers. A failed operation leaves both the persisted and the
//! in-memory cart untouched.

use std::future::Future;
use std::sync::Arc;

use storefront_cart_core::{CartSnapshot, CurrencyCode, LineItem, ProductId};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{info, instrument};

use crate::config::{CartConfig, DEFAULT_STORAGE_KEY};
use crate::error::{CartError, Notice, Operation, Result, add_breadcrumb};
use crate::stock::{StockError, StockService};
use crate::storage::PersistentKv;
use crate::view::CartView;

/// Settings for a [`CartStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Key the serialized cart is stored under.
    pub storage_key: String,
    /// Currency used by [`CartStore::view`].
    pub currency: CurrencyCode,
    /// Number of unread notices kept per subscriber.
    pub notice_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            currency: CurrencyCode::default(),
            notice_capacity: 32,
        }
    }
}

impl From<&CartConfig> for StoreOptions {
    fn from(config: &CartConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            currency: config.currency,
            ..Self::default()
        }
    }
}

/// Shopping cart state for one session.
///
/// Cheaply cloneable via `Arc`; clones share state and the write lock.
pub struct CartStore<S, K> {
    inner: Arc<CartStoreInner<S, K>>,
}

struct CartStoreInner<S, K> {
    stock: S,
    kv: K,
    options: StoreOptions,
    write_lock: Mutex<()>,
    snapshot_tx: watch::Sender<CartSnapshot>,
    notice_tx: broadcast::Sender<Notice>,
}

impl<S, K> Clone for CartStore<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, K> CartStore<S, K>
where
    S: StockService,
    K: PersistentKv,
{
    /// Open the cart persisted under the configured key.
    ///
    /// A missing entry yields an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CorruptState` if the stored cart cannot be decoded
    /// (call [`CartStore::open_fresh`] to discard it), or
    /// `CartError::Storage` if the backend cannot be read.
    pub async fn open(stock: S, kv: K, options: StoreOptions) -> Result<Self> {
        let snapshot = load_snapshot(&kv, &options.storage_key)
            .await
            .inspect_err(|e| e.report(Operation::Open, None))?;
        info!(
            key = %options.storage_key,
            items = snapshot.len(),
            "Cart loaded"
        );
        Ok(Self::with_snapshot(stock, kv, options, snapshot))
    }

    /// Open with an empty cart, overwriting whatever is stored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the empty cart cannot be written.
    pub async fn open_fresh(stock: S, kv: K, options: StoreOptions) -> Result<Self> {
        let snapshot = CartSnapshot::new();
        persist_snapshot(&kv, &options.storage_key, &snapshot)
            .await
            .inspect_err(|e| e.report(Operation::Open, None))?;
        info!(key = %options.storage_key, "Cart reset");
        Ok(Self::with_snapshot(stock, kv, options, snapshot))
    }

    fn with_snapshot(stock: S, kv: K, options: StoreOptions, snapshot: CartSnapshot) -> Self {
        let (snapshot_tx, _) = watch::channel(snapshot);
        let (notice_tx, _) = broadcast::channel(options.notice_capacity.max(1));
        Self {
            inner: Arc::new(CartStoreInner {
                stock,
                kv,
                options,
                write_lock: Mutex::new(()),
                snapshot_tx,
                notice_tx,
            }),
        }
    }

    /// The cart as of the last successful write.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receive every new snapshot after a successful change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Receive user-facing notices for failed operations.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notice_tx.subscribe()
    }

    /// Display projection of the current cart.
    #[must_use]
    pub fn view(&self) -> CartView {
        CartView::new(&self.snapshot(), self.inner.options.currency)
    }

    /// Add one unit of a product.
    ///
    /// A product already in the cart is incremented if stock allows; a new
    /// product is appended with quantity one after fetching its metadata.
    ///
    /// # Errors
    ///
    /// - `OutOfStock` if the cart already holds every available unit (or the
    ///   product has no stock at all)
    /// - `LookupFailed` if the stock service cannot answer
    /// - `CorruptState` / `Storage` if the persisted cart cannot be read or written
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: ProductId) -> Result<()> {
        self.apply(
            Operation::AddProduct,
            Some(product_id),
            self.added(product_id),
        )
        .await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product is not in the cart
    /// - `CorruptState` / `Storage` if the persisted cart cannot be read or written
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_product(&self, product_id: ProductId) -> Result<()> {
        self.apply(
            Operation::RemoveProduct,
            Some(product_id),
            self.removed(product_id),
        )
        .await
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `amount` is zero or negative (checked before any lookup)
    /// - `OutOfStock` if `amount` exceeds the available stock
    /// - `NotFound` if the product is not in the cart
    /// - `LookupFailed` if the stock service cannot answer
    /// - `CorruptState` / `Storage` if the persisted cart cannot be read or written
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_product_amount(&self, product_id: ProductId, amount: i64) -> Result<()> {
        self.apply(
            Operation::UpdateProductAmount,
            Some(product_id),
            self.with_amount(product_id, amount),
        )
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the empty cart cannot be written.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.apply(
            Operation::Clear,
            None,
            std::future::ready(Ok(CartSnapshot::new())),
        )
        .await
    }

    /// Re-read the persisted cart and publish it if it changed.
    ///
    /// Picks up writes made through another handle on the same storage.
    ///
    /// # Errors
    ///
    /// Returns `CorruptState` / `Storage` if the persisted cart cannot be read.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartSnapshot> {
        let _guard = self.inner.write_lock.lock().await;
        let snapshot = self
            .load()
            .await
            .inspect_err(|e| e.report(Operation::Open, None))?;
        self.inner.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
        Ok(snapshot)
    }

    /// Run one serialized read-modify-write cycle.
    ///
    /// `change` produces the new cart; on success it is persisted and
    /// published, on failure a notice is sent and nothing is written.
    async fn apply<F>(
        &self,
        operation: Operation,
        product_id: Option<ProductId>,
        change: F,
    ) -> Result<()>
    where
        F: Future<Output = Result<CartSnapshot>>,
    {
        let _guard = self.inner.write_lock.lock().await;

        let result = match change.await {
            Ok(cart) => self.persist(&cart).await.map(|()| cart),
            Err(e) => Err(e),
        };

        match result {
            Ok(cart) => {
                let quantity = product_id.and_then(|id| cart.quantity_of(id));
                info!(
                    operation = %operation,
                    quantity = ?quantity,
                    items = cart.len(),
                    "Cart updated"
                );
                add_breadcrumb(
                    operation,
                    "Cart updated",
                    &[
                        ("product_id", product_id.map(|id| id.to_string()).unwrap_or_default()),
                        ("items", cart.len().to_string()),
                    ],
                );
                self.inner.snapshot_tx.send_replace(cart);
                Ok(())
            }
            Err(e) => {
                e.report(operation, product_id);
                // No subscribers is fine; the error is still returned.
                let _ = self.inner.notice_tx.send(e.notice(operation, product_id));
                Err(e)
            }
        }
    }

    /// The cart with one more unit of `product_id`.
    async fn added(&self, product_id: ProductId) -> Result<CartSnapshot> {
        let stock = self.inner.stock.stock(product_id).await?;
        let available = stock.available_quantity;
        let mut cart = self.load().await?;

        match cart.quantity_of(product_id) {
            Some(current) if current >= available => Err(CartError::OutOfStock {
                product_id,
                requested: u64::from(current) + 1,
                available,
            }),
            Some(_) => {
                cart.increment(product_id);
                Ok(cart)
            }
            None if available == 0 => Err(CartError::OutOfStock {
                product_id,
                requested: 1,
                available,
            }),
            None => {
                let details = self.inner.stock.product(product_id).await?;
                cart.insert(LineItem::from_details(details, 1))
                    .map_err(|e| StockError::Parse(e.to_string()))?;
                Ok(cart)
            }
        }
    }

    /// The cart without `product_id`.
    async fn removed(&self, product_id: ProductId) -> Result<CartSnapshot> {
        let mut cart = self.load().await?;
        cart.remove(product_id)
            .ok_or(CartError::NotFound(product_id))?;
        Ok(cart)
    }

    /// The cart with `product_id` set to `amount` units.
    async fn with_amount(&self, product_id: ProductId, amount: i64) -> Result<CartSnapshot> {
        if amount <= 0 {
            return Err(CartError::InvalidInput(format!(
                "amount must be at least 1 (got {amount})"
            )));
        }

        let stock = self.inner.stock.stock(product_id).await?;
        let available = stock.available_quantity;
        if amount > i64::from(available) {
            return Err(CartError::OutOfStock {
                product_id,
                requested: u64::try_from(amount).unwrap_or(u64::MAX),
                available,
            });
        }
        let quantity =
            u32::try_from(amount).map_err(|e| CartError::InvalidInput(e.to_string()))?;

        let mut cart = self.load().await?;
        if !cart.set_quantity(product_id, quantity) {
            return Err(CartError::NotFound(product_id));
        }
        Ok(cart)
    }

    async fn load(&self) -> Result<CartSnapshot> {
        load_snapshot(&self.inner.kv, &self.inner.options.storage_key).await
    }

    async fn persist(&self, cart: &CartSnapshot) -> Result<()> {
        persist_snapshot(&self.inner.kv, &self.inner.options.storage_key, cart).await
    }
}

async fn load_snapshot<K: PersistentKv>(kv: &K, key: &str) -> Result<CartSnapshot> {
    match kv.get(key).await? {
        Some(blob) => Ok(CartSnapshot::from_json(&blob)?),
        None => Ok(CartSnapshot::new()),
    }
}

async fn persist_snapshot<K: PersistentKv>(kv: &K, key: &str, cart: &CartSnapshot) -> Result<()> {
    let json = cart.to_json()?;
    kv.set(key, json).await?;
    Ok(())
}
