//! HTTP stock service client using `reqwest` 0.13.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use storefront_cart_core::{ProductDetails, ProductId, StockInfo};
use tracing::{debug, instrument};
use url::Url;

use super::{StockError, StockService};
use crate::config::StockApiConfig;

/// Client for the stock service REST API.
///
/// Cheaply cloneable; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct HttpStockService {
    inner: Arc<HttpStockServiceInner>,
}

struct HttpStockServiceInner {
    client: reqwest::Client,
    base_url: Url,
    products: Cache<ProductId, ProductDetails>,
}

impl HttpStockService {
    /// Create a new stock service client.
    ///
    /// # Errors
    ///
    /// Returns error if the API token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StockApiConfig) -> Result<Self, StockError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| StockError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpStockServiceInner {
                client,
                base_url: with_trailing_slash(config.base_url.clone()),
                products,
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, resource: &str, product_id: ProductId) -> Result<Url, StockError> {
        self.inner
            .base_url
            .join(&format!("{resource}/{product_id}"))
            .map_err(|e| StockError::Parse(format!("Invalid endpoint URL: {e}")))
    }

    /// Fetch and decode a JSON resource for a product.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        product_id: ProductId,
    ) -> Result<T, StockError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StockError::NotFound(product_id));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(StockError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Stock service returned non-success status"
            );
            return Err(StockError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse stock service response"
            );
            StockError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl StockService for HttpStockService {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn stock(&self, product_id: ProductId) -> Result<StockInfo, StockError> {
        let url = self.endpoint("stock", product_id)?;
        let stock: StockInfo = self.get_json(url, product_id).await?;
        ensure_same_product(product_id, stock.product_id)?;
        debug!(available = stock.available_quantity, "Fetched stock level");
        Ok(stock)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: ProductId) -> Result<ProductDetails, StockError> {
        if let Some(cached) = self.inner.products.get(&product_id).await {
            debug!("Product cache hit");
            return Ok(cached);
        }

        let url = self.endpoint("products", product_id)?;
        let product: ProductDetails = self.get_json(url, product_id).await?;
        ensure_same_product(product_id, product.product_id)?;

        self.inner.products.insert(product_id, product.clone()).await;
        Ok(product)
    }
}

/// Guard against a service answering for a different product.
fn ensure_same_product(requested: ProductId, returned: ProductId) -> Result<(), StockError> {
    if requested == returned {
        Ok(())
    } else {
        Err(StockError::Parse(format!(
            "requested product {requested} but service returned {returned}"
        )))
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
