//! End-to-end cart tests against an HTTP stock service.
//!
//! Each test starts its own [`StockApiFixture`] and stores the cart in a
//! fresh scratch directory through [`FileKv`].

use std::time::Duration;

use secrecy::SecretString;
use storefront_cart::{
    CartError, CartSnapshot, CartStore, FileKv, HttpStockService, PersistentKv, ProductId,
    StockApiConfig, StockError, StoreOptions,
};
use storefront_cart_integration_tests::{FixtureProduct, StockApiFixture, scratch_dir};

const KEY: &str = "cart-store-v1";

type Store = CartStore<HttpStockService, FileKv>;

fn client(fixture: &StockApiFixture) -> HttpStockService {
    HttpStockService::new(&StockApiConfig::new(fixture.base_url()))
        .expect("Failed to build stock client")
}

async fn open(fixture: &StockApiFixture, kv: &FileKv) -> Store {
    CartStore::open(client(fixture), kv.clone(), StoreOptions::default())
        .await
        .expect("Failed to open cart")
}

async fn persisted(kv: &FileKv) -> CartSnapshot {
    let blob = kv
        .get(KEY)
        .await
        .expect("Failed to read cart")
        .expect("Cart was never written");
    CartSnapshot::from_json(&blob).expect("Persisted cart is invalid")
}

// ============================================================================
// Add / Update / Remove Flows
// ============================================================================

#[tokio::test]
async fn test_add_until_out_of_stock() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(42, FixtureProduct::new(42, 179.9, 5));
    let dir = scratch_dir("add");
    let kv = FileKv::new(&dir);
    let store = open(&fixture, &kv).await;
    let id = ProductId::new(42);

    store.add_product(id).await.expect("First add failed");
    let line = store.snapshot().get(id).cloned().expect("Line missing");
    assert_eq!(line.quantity, 1);
    assert_eq!(line.title, "Sneaker 42");
    assert_eq!(line.image_url, "https://cdn.example.test/sneakers/42.jpg");
    assert_eq!(store.view().items[0].price, "$179.90");

    for _ in 0..4 {
        store.add_product(id).await.expect("Add within stock failed");
    }
    assert_eq!(store.snapshot().quantity_of(id), Some(5));

    let before = kv.get(KEY).await.expect("Failed to read cart");
    let err = store.add_product(id).await.expect_err("Sixth add should fail");
    assert!(matches!(err, CartError::OutOfStock { available: 5, .. }));
    assert_eq!(kv.get(KEY).await.expect("Failed to read cart"), before);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_update_and_remove() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(7, FixtureProduct::new(7, 99.0, 3));
    fixture.insert(8, FixtureProduct::new(8, 10.5, 10));
    let dir = scratch_dir("update");
    let kv = FileKv::new(&dir);
    let store = open(&fixture, &kv).await;

    store.add_product(ProductId::new(7)).await.expect("Add 7 failed");
    store.add_product(ProductId::new(8)).await.expect("Add 8 failed");
    store
        .update_product_amount(ProductId::new(7), 3)
        .await
        .expect("Update within stock failed");

    let err = store
        .update_product_amount(ProductId::new(7), 10)
        .await
        .expect_err("Update beyond stock should fail");
    assert!(matches!(err, CartError::OutOfStock { requested: 10, .. }));
    assert_eq!(store.snapshot().quantity_of(ProductId::new(7)), Some(3));

    store
        .update_product_amount(ProductId::new(7), 2)
        .await
        .expect("Update down failed");
    assert_eq!(persisted(&kv).await.quantity_of(ProductId::new(7)), Some(2));

    store
        .remove_product(ProductId::new(7))
        .await
        .expect("Remove failed");
    let cart = persisted(&kv).await;
    assert!(!cart.contains(ProductId::new(7)));
    assert_eq!(cart.quantity_of(ProductId::new(8)), Some(1));

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_unknown_product_is_lookup_failure() {
    let fixture = StockApiFixture::start().await;
    let dir = scratch_dir("unknown");
    let kv = FileKv::new(&dir);
    let store = open(&fixture, &kv).await;
    let mut notices = store.notices();

    let err = store
        .add_product(ProductId::new(404))
        .await
        .expect_err("Unknown product should fail");
    assert!(matches!(
        err,
        CartError::LookupFailed(StockError::NotFound(id)) if id == ProductId::new(404)
    ));
    assert_eq!(
        notices.recv().await.expect("No notice").message,
        "failed to add product"
    );
    assert_eq!(kv.get(KEY).await.expect("Failed to read cart"), None);
}

#[tokio::test]
async fn test_unreachable_stock_service() {
    // Bind then release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("Failed to reserve a port");
    let base_url = format!("http://{addr}").parse().expect("Invalid URL");
    let mut config = StockApiConfig::new(base_url);
    config.timeout = Duration::from_secs(2);
    let stock = HttpStockService::new(&config).expect("Failed to build stock client");
    let dir = scratch_dir("unreachable");
    let store = CartStore::open(stock, FileKv::new(&dir), StoreOptions::default())
        .await
        .expect("Failed to open cart");

    let err = store
        .add_product(ProductId::new(1))
        .await
        .expect_err("Add should fail without a stock service");
    assert!(matches!(err, CartError::LookupFailed(StockError::Http(_))));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_stock_is_read_on_every_mutation() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(3, FixtureProduct::new(3, 12.0, 4));
    let dir = scratch_dir("shrink");
    let store = open(&fixture, &FileKv::new(&dir)).await;
    let id = ProductId::new(3);

    store.add_product(id).await.expect("First add failed");
    store.add_product(id).await.expect("Second add failed");
    fixture.set_amount(3, 2);

    let err = store.add_product(id).await.expect_err("Stock dropped to 2");
    assert!(matches!(err, CartError::OutOfStock { available: 2, .. }));
    assert_eq!(fixture.stock_requests(), 3);
    assert_eq!(fixture.product_requests(), 1);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

// ============================================================================
// Stock Client
// ============================================================================

#[tokio::test]
async fn test_product_details_are_cached() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(5, FixtureProduct::new(5, 15.0, 10));
    let dir = scratch_dir("cache");
    let store = open(&fixture, &FileKv::new(&dir)).await;
    let id = ProductId::new(5);

    store.add_product(id).await.expect("Add failed");
    store.remove_product(id).await.expect("Remove failed");
    store.add_product(id).await.expect("Re-add failed");

    assert_eq!(fixture.product_requests(), 1);
    assert_eq!(fixture.stock_requests(), 2);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_base_url_with_path_prefix() {
    let fixture = StockApiFixture::start_at("/api").await;
    fixture.insert(9, FixtureProduct::new(9, 5.0, 1));
    let dir = scratch_dir("prefix");
    let store = open(&fixture, &FileKv::new(&dir)).await;

    store
        .add_product(ProductId::new(9))
        .await
        .expect("Add under /api failed");
    assert_eq!(store.snapshot().quantity_of(ProductId::new(9)), Some(1));

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(1, FixtureProduct::new(1, 5.0, 1));
    let mut config = StockApiConfig::new(fixture.base_url());
    config.api_token = Some(SecretString::from("stock-token-123".to_string()));
    let stock = HttpStockService::new(&config).expect("Failed to build stock client");
    let dir = scratch_dir("token");
    let store = CartStore::open(stock, FileKv::new(&dir), StoreOptions::default())
        .await
        .expect("Failed to open cart");

    store.add_product(ProductId::new(1)).await.expect("Add failed");
    assert_eq!(
        fixture.last_authorization().as_deref(),
        Some("Bearer stock-token-123")
    );

    tokio::fs::remove_dir_all(&dir).await.ok();
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_cart_survives_reopen() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(1, FixtureProduct::new(1, 20.0, 4));
    fixture.insert(2, FixtureProduct::new(2, 30.0, 4));
    let dir = scratch_dir("reopen");
    let kv = FileKv::new(&dir);

    {
        let store = open(&fixture, &kv).await;
        store.add_product(ProductId::new(2)).await.expect("Add 2 failed");
        store.add_product(ProductId::new(1)).await.expect("Add 1 failed");
        store.add_product(ProductId::new(2)).await.expect("Add 2 again failed");
    }

    let reopened = open(&fixture, &FileKv::new(&dir)).await;
    let snapshot = reopened.snapshot();
    let order: Vec<i32> = snapshot.iter().map(|l| l.product_id.as_i32()).collect();
    assert_eq!(order, vec![2, 1]);
    assert_eq!(snapshot.quantity_of(ProductId::new(2)), Some(2));
    assert_eq!(reopened.view().subtotal, "$80.00");

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_corrupt_file_requires_explicit_reset() {
    let fixture = StockApiFixture::start().await;
    let dir = scratch_dir("corrupt");
    let kv = FileKv::new(&dir);
    kv.set(KEY, "[{\"productId\":1".to_string())
        .await
        .expect("Failed to seed cart");

    let result = CartStore::open(client(&fixture), kv.clone(), StoreOptions::default()).await;
    assert!(matches!(result, Err(CartError::CorruptState(_))));

    let store = CartStore::open_fresh(client(&fixture), kv.clone(), StoreOptions::default())
        .await
        .expect("Reset failed");
    assert!(store.snapshot().is_empty());
    assert!(persisted(&kv).await.is_empty());

    tokio::fs::remove_dir_all(&dir).await.ok();
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_over_http() {
    let fixture = StockApiFixture::start().await;
    fixture.insert(42, FixtureProduct::new(42, 1.0, 8));
    let dir = scratch_dir("concurrent");
    let kv = FileKv::new(&dir);
    let store = open(&fixture, &kv).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.add_product(ProductId::new(42)).await })
        })
        .collect();

    let mut added = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.expect("Task panicked") {
            Ok(()) => added += 1,
            Err(CartError::OutOfStock { .. }) => rejected += 1,
            Err(e) => panic!("Unexpected error: {e}"),
        }
    }

    assert_eq!(added, 8);
    assert_eq!(rejected, 2);
    assert_eq!(persisted(&kv).await.quantity_of(ProductId::new(42)), Some(8));

    tokio::fs::remove_dir_all(&dir).await.ok();
}
