//! Cart commands.
//!
//! # Environment Variables
//!
//! - `CART_STOCK_API_URL` - Stock service base URL (required)
//! - `CART_STORAGE_DIR` - Directory holding the cart file (default: .cart)

use storefront_cart::{
    CartConfig, CartError, CartStore, CartView, FileKv, HttpStockService, ProductId, StoreOptions,
};
use tokio::sync::broadcast;

use super::Output;

type Store = CartStore<HttpStockService, FileKv>;
type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the configured cart.
async fn open(config: &CartConfig) -> Result<Store, Box<dyn std::error::Error>> {
    let stock = HttpStockService::new(&config.stock)?;
    let kv = FileKv::new(&config.storage_dir);

    tracing::debug!(
        stock_api = %stock.base_url(),
        dir = %kv.dir().display(),
        "Opening cart"
    );

    match CartStore::open(stock, kv, StoreOptions::from(config)).await {
        Ok(store) => Ok(store),
        Err(e @ CartError::CorruptState(_)) => {
            tracing::error!("Stored cart is unreadable; run `cart-cli reset` to discard it");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the cart.
pub async fn show(config: &CartConfig, output: Output) -> CommandResult {
    let store = open(config).await?;
    print_cart(&store.view(), output)
}

/// Add one unit of a product.
pub async fn add(config: &CartConfig, product_id: ProductId, output: Output) -> CommandResult {
    let store = open(config).await?;
    let mut notices = store.notices();
    let result = store.add_product(product_id).await;
    finish(&store, result, &mut notices, output)
}

/// Remove a product.
pub async fn remove(config: &CartConfig, product_id: ProductId, output: Output) -> CommandResult {
    let store = open(config).await?;
    let mut notices = store.notices();
    let result = store.remove_product(product_id).await;
    finish(&store, result, &mut notices, output)
}

/// Set a product's quantity.
pub async fn update(
    config: &CartConfig,
    product_id: ProductId,
    amount: i64,
    output: Output,
) -> CommandResult {
    let store = open(config).await?;
    let mut notices = store.notices();
    let result = store.update_product_amount(product_id, amount).await;
    finish(&store, result, &mut notices, output)
}

/// Replace the stored cart with an empty one.
pub async fn reset(config: &CartConfig, output: Output) -> CommandResult {
    let stock = HttpStockService::new(&config.stock)?;
    let kv = FileKv::new(&config.storage_dir);
    let dir = kv.dir().to_path_buf();
    let store = CartStore::open_fresh(stock, kv, StoreOptions::from(config)).await?;
    tracing::info!(dir = %dir.display(), "Cart reset");
    print_cart(&store.view(), output)
}

/// Show the shopper-facing notice on failure, otherwise the updated cart.
fn finish(
    store: &Store,
    result: Result<(), CartError>,
    notices: &mut broadcast::Receiver<storefront_cart::Notice>,
    output: Output,
) -> CommandResult {
    match result {
        Ok(()) => print_cart(&store.view(), output),
        Err(e) => {
            if let Ok(notice) = notices.try_recv() {
                print_line(&format!("! {}", notice.message));
            }
            Err(e.into())
        }
    }
}

fn print_cart(view: &CartView, output: Output) -> CommandResult {
    if output.json {
        print_line(&serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    if view.items.is_empty() {
        print_line("Cart is empty");
        return Ok(());
    }

    for item in &view.items {
        print_line(&format!(
            "{:>6}  {:<40} {:>4} x {:>10} = {:>10}",
            item.product_id, item.title, item.quantity, item.price, item.line_price
        ));
    }
    print_line(&format!(
        "{} item(s), subtotal {} {}",
        view.item_count, view.subtotal, view.currency
    ));
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}
