//! Integration tests for the storefront cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storefront-cart-integration-tests
//! ```
//!
//! Tests run against [`StockApiFixture`], a real HTTP stock service served by
//! `axum` on an ephemeral localhost port, and store carts in scratch
//! directories under the system temp dir. No external services are needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;

/// A product served by the fixture.
#[derive(Debug, Clone)]
pub struct FixtureProduct {
    pub title: String,
    pub price: f64,
    pub image: String,
    pub amount: u32,
}

impl FixtureProduct {
    /// A product with a generated title and image.
    #[must_use]
    pub fn new(id: i32, price: f64, amount: u32) -> Self {
        Self {
            title: format!("Sneaker {id}"),
            price,
            image: format!("https://cdn.example.test/sneakers/{id}.jpg"),
            amount,
        }
    }
}

#[derive(Default)]
struct FixtureState {
    products: HashMap<i32, FixtureProduct>,
    stock_requests: usize,
    product_requests: usize,
    last_authorization: Option<String>,
}

/// In-process stock service speaking the storefront stock API.
///
/// - `GET {prefix}/stock/{id}` - `{"id": .., "amount": ..}`
/// - `GET {prefix}/products/{id}` - `{"id": .., "title": .., "price": .., "image": ..}`
#[derive(Clone)]
pub struct StockApiFixture {
    state: Arc<Mutex<FixtureState>>,
    base_url: Url,
}

impl StockApiFixture {
    /// Start a fixture serving the API at the root path.
    ///
    /// # Panics
    ///
    /// Panics if no localhost port can be bound.
    pub async fn start() -> Self {
        Self::start_at("").await
    }

    /// Start a fixture serving the API under `prefix` (e.g. `/api`).
    ///
    /// # Panics
    ///
    /// Panics if no localhost port can be bound.
    pub async fn start_at(prefix: &str) -> Self {
        let state = Arc::new(Mutex::new(FixtureState::default()));

        let api = Router::new()
            .route("/stock/{id}", get(stock))
            .route("/products/{id}", get(product))
            .with_state(Arc::clone(&state));
        let app = if prefix.is_empty() {
            api
        } else {
            Router::new().nest(prefix, api)
        };

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind fixture listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read fixture address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fixture server error");
        });

        let base_url = Url::parse(&format!("http://{addr}{prefix}")).expect("Invalid fixture URL");
        Self { state, base_url }
    }

    /// Base URL to configure the stock client with.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Add or replace a product.
    pub fn insert(&self, id: i32, product: FixtureProduct) {
        self.lock().products.insert(id, product);
    }

    /// Change the stock level of an existing product.
    pub fn set_amount(&self, id: i32, amount: u32) {
        if let Some(product) = self.lock().products.get_mut(&id) {
            product.amount = amount;
        }
    }

    /// Number of `/stock/{id}` requests served.
    #[must_use]
    pub fn stock_requests(&self) -> usize {
        self.lock().stock_requests
    }

    /// Number of `/products/{id}` requests served.
    #[must_use]
    pub fn product_requests(&self) -> usize {
        self.lock().product_requests
    }

    /// `Authorization` header of the most recent request.
    #[must_use]
    pub fn last_authorization(&self) -> Option<String> {
        self.lock().last_authorization.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SharedState = Arc<Mutex<FixtureState>>;

fn record_auth(state: &mut FixtureState, headers: &HeaderMap) {
    state.last_authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
}

async fn stock(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.stock_requests += 1;
    record_auth(&mut state, &headers);

    let product = state.products.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "id": id, "amount": product.amount })))
}

async fn product(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.product_requests += 1;
    record_auth(&mut state, &headers);

    let product = state.products.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({
        "id": id,
        "title": product.title,
        "price": product.price,
        "image": product.image,
    })))
}

/// A unique, not-yet-created directory under the system temp dir.
#[must_use]
pub fn scratch_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("cart-{label}-{}", uuid::Uuid::new_v4()))
}
