use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use common::config::ProviderCredentials;
use common::{AssetClass, Error, PricePoint, Result, Timeframe};

use super::{check_length, get_json, http_client, walk_back, Fetcher};

const HOURS_PER_H4: usize = 4;

/// Crypto price history. D1 and H4 come from TokenInsight, W1 from CoinAPI.
pub struct CryptoFetcher {
    token_insight: TokenInsightClient,
    coin_api: CoinApiClient,
}

impl CryptoFetcher {
    pub fn new(
        token_insight: &ProviderCredentials,
        coin_api: &ProviderCredentials,
        shorthands: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = http_client(timeout)?;
        Ok(Self {
            token_insight: TokenInsightClient {
                base_url: token_insight.base_url.trim_end_matches('/').to_string(),
                key: token_insight.key.clone(),
                http: http.clone(),
            },
            coin_api: CoinApiClient {
                base_url: coin_api.base_url.trim_end_matches('/').to_string(),
                key: coin_api.key.clone(),
                shorthands,
                http,
                gate: Mutex::new(()),
            },
        })
    }
}

#[async_trait]
impl Fetcher for CryptoFetcher {
    fn asset_class(&self) -> AssetClass {
        AssetClass::Crypto
    }

    async fn fetch(&self, timeframe: Timeframe, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        check_length(length)?;
        match timeframe {
            Timeframe::D1 => self.token_insight.market_chart(symbol, "day", length, 1).await,
            Timeframe::H4 => {
                self.token_insight
                    .market_chart(symbol, "hour", length, HOURS_PER_H4)
                    .await
            }
            Timeframe::W1 => self.coin_api.weekly(symbol, length).await,
        }
    }
}

// ─── TokenInsight ─────────────────────────────────────────────────────────────

struct TokenInsightClient {
    base_url: String,
    key: String,
    http: Client,
}

impl TokenInsightClient {
    const PROVIDER: &'static str = "tokeninsight";

    /// Request `length * step` points at `interval` and keep every `step`-th.
    async fn market_chart(
        &self,
        symbol: &str,
        interval: &str,
        length: usize,
        step: usize,
    ) -> Result<Vec<PricePoint>> {
        let url = format!("{}/{}", self.base_url, symbol.to_lowercase());
        let req = self
            .http
            .get(&url)
            .query(&[("interval", interval.to_string()), ("length", (length * step).to_string())])
            .header("TI_API_KEY", &self.key);

        debug!(url = %url, interval, length, "Requesting TokenInsight market chart");
        let resp: MarketChartResponse = get_json(Self::PROVIDER, req).await?;

        walk_back(Self::PROVIDER, &resp.data.market_chart, 0, step, length)?
            .into_iter()
            .map(|p| {
                let time = DateTime::from_timestamp_millis(p.timestamp).ok_or_else(|| Error::Decode {
                    provider: Self::PROVIDER,
                    message: format!("timestamp out of range: {}", p.timestamp),
                })?;
                Ok(PricePoint::new(time, p.price))
            })
            .collect()
    }
}

// ─── CoinAPI ──────────────────────────────────────────────────────────────────

/// CoinAPI rejects concurrent requests on our tier, so every call holds `gate`.
struct CoinApiClient {
    base_url: String,
    key: String,
    shorthands: HashMap<String, String>,
    http: Client,
    gate: Mutex<()>,
}

impl CoinApiClient {
    const PROVIDER: &'static str = "coinapi";

    async fn weekly(&self, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        let shorthand = self
            .shorthands
            .get(symbol)
            .ok_or_else(|| Error::UnmappedSymbol(symbol.to_string()))?;

        let now = Utc::now();
        let start = now - chrono::Duration::days(length as i64 * 7);
        let url = format!("{}/BITSTAMP_SPOT_{shorthand}_USD/history", self.base_url);
        let req = self
            .http
            .get(&url)
            .query(&[
                ("time_start", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
                ("time_end", now.format("%Y-%m-%dT%H:%M:%S").to_string()),
                ("period_id", "7DAY".to_string()),
                ("limit", length.to_string()),
            ])
            .header("X-CoinAPI-Key", &self.key);

        let bars: Vec<CoinApiBar> = {
            let _slot = self.gate.lock().await;
            debug!(url = %url, length, "Requesting CoinAPI weekly history");
            get_json(Self::PROVIDER, req).await?
        };

        walk_back(Self::PROVIDER, &bars, 0, 1, length)?
            .into_iter()
            .map(|bar| {
                let time = bar.time_period_end.parse::<DateTime<Utc>>().map_err(|e| Error::Decode {
                    provider: Self::PROVIDER,
                    message: format!("bad time_period_end '{}': {e}", bar.time_period_end),
                })?;
                Ok(PricePoint::new(time, bar.price_close))
            })
            .collect()
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MarketChartResponse {
    data: MarketChartData,
}

#[derive(Deserialize)]
struct MarketChartData {
    #[serde(default)]
    market_chart: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartPoint {
    price: f64,
    timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct CoinApiBar {
    time_period_end: String,
    price_close: f64,
}
