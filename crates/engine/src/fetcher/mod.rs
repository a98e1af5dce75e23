//! Price fetchers: one per asset class, each normalizing its providers'
//! responses into an ascending series of price points.

pub mod crypto;
pub mod registry;
pub mod stock;

pub use crypto::CryptoFetcher;
pub use registry::FetcherRegistry;
pub use stock::StockFetcher;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use common::{AssetClass, Error, PricePoint, Result, Timeframe, WINDOW_CAPACITY};

/// Retrieves a price series for one asset class.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn asset_class(&self) -> AssetClass;

    /// Fetch `length` points, oldest first. `length` above the window capacity
    /// is rejected before any request is made.
    async fn fetch(&self, timeframe: Timeframe, symbol: &str, length: usize) -> Result<Vec<PricePoint>>;
}

pub(crate) fn check_length(length: usize) -> Result<()> {
    if length > WINDOW_CAPACITY {
        return Err(Error::MaxLengthExceeded(WINDOW_CAPACITY));
    }
    Ok(())
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("build http client: {e}")))
}

/// Walk backward from the latest row (after skipping `skip` rows) taking every
/// `step`-th row until `length` are collected. Returned oldest first.
pub(crate) fn walk_back<T: Clone>(
    provider: &'static str,
    rows: &[T],
    skip: usize,
    step: usize,
    length: usize,
) -> Result<Vec<T>> {
    if length == 0 {
        return Ok(Vec::new());
    }

    let need = skip + (length - 1) * step + 1;
    if rows.len() < need {
        return Err(Error::InsufficientData {
            provider,
            got: rows.len(),
            need,
        });
    }

    let latest = rows.len() - 1 - skip;
    Ok((0..length)
        .rev()
        .map(|k| rows[latest - k * step].clone())
        .collect())
}

/// Send a GET and decode a JSON body. Non-2xx responses become provider
/// errors carrying status and body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    req: RequestBuilder,
) -> Result<T> {
    let resp = req
        .header("accept", "application/json")
        .send()
        .await
        .map_err(|e| Error::Provider {
            provider,
            message: e.to_string(),
        })?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Provider {
        provider,
        message: e.to_string(),
    })?;

    if !status.is_success() {
        return Err(Error::Provider {
            provider,
            message: format!("HTTP {status}: {body}"),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Decode {
        provider,
        message: e.to_string(),
    })
}
