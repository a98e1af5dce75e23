use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::config::RapidApiConfig;
use common::{AssetClass, Error, PricePoint, Result, Timeframe};

use super::{check_length, get_json, http_client, walk_back, Fetcher};

const PROVIDER: &str = "rapidapi";

/// The intraday endpoint returns at most 1000 hourly rows; at 4 rows per
/// H4 point that caps the series at 250.
pub const INTRADAY_MAX_LENGTH: usize = 250;

const HOURS_PER_H4: usize = 4;
/// Calendar days requested per trading point, so weekends and holidays
/// still leave enough rows.
const DAYS_PER_POINT: i64 = 2;
const WEEKLY_STEP: usize = 2;

/// Stock price history from the RapidAPI historical-data endpoints.
pub struct StockFetcher {
    base_url: String,
    key: String,
    host: String,
    http: Client,
}

impl StockFetcher {
    pub fn new(cfg: &RapidApiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            key: cfg.key.clone(),
            host: cfg.host.clone(),
            http: http_client(timeout)?,
        })
    }

    async fn history(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Vec<Bar>> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(url = %url, ?query, "Requesting stock history");

        let req = self
            .http
            .get(&url)
            .query(query)
            .header("X-RapidAPI-Key", &self.key)
            .header("X-RapidAPI-Host", &self.host);

        let resp: HistoryResponse = get_json(PROVIDER, req).await?;
        Ok(resp.results)
    }

    async fn intraday(&self, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        let length = length.min(INTRADAY_MAX_LENGTH);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", "60min".to_string()),
            ("maxreturn", (HOURS_PER_H4 * length).to_string()),
        ];
        let bars = self.history("intraday", &query).await?;

        walk_back(PROVIDER, &bars, 0, HOURS_PER_H4, length)?
            .into_iter()
            .map(|bar| Ok(PricePoint::new(parse_hour(&bar.date)?, bar.close)))
            .collect()
    }

    async fn end_of_period(&self, timeframe: Timeframe, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        let (endpoint, days_per_point) = match timeframe {
            Timeframe::W1 => ("weekly", DAYS_PER_POINT * 7),
            _ => ("daily", DAYS_PER_POINT),
        };

        let today = Utc::now().with_timezone(&New_York).date_naive();
        let start = today - chrono::Duration::days(length as i64 * days_per_point);
        let query = [
            ("symbol", symbol.to_string()),
            ("dateStart", start.format("%Y-%m-%d").to_string()),
            ("dateEnd", today.format("%Y-%m-%d").to_string()),
        ];
        let bars = self.history(endpoint, &query).await?;

        let (skip, step) = match timeframe {
            Timeframe::W1 => weekly_walk(&bars),
            _ => (0, 1),
        };

        walk_back(PROVIDER, &bars, skip, step, length)?
            .into_iter()
            .map(|bar| Ok(PricePoint::new(parse_day(&bar.date)?, bar.close)))
            .collect()
    }
}

/// Provider heuristic: weekly rows are not exact weeks and the current week
/// appears twice when the latest two closes match. Start one row earlier in
/// that case, then take every second row.
fn weekly_walk(bars: &[Bar]) -> (usize, usize) {
    match bars {
        [.., prev, last] if prev.close == last.close => (1, WEEKLY_STEP),
        _ => (0, WEEKLY_STEP),
    }
}

/// Provider dates are exchange-local (New York) wall-clock times.
fn new_york_to_utc(local: NaiveDateTime, raw: &str) -> Result<DateTime<Utc>> {
    New_York
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Decode {
            provider: PROVIDER,
            message: format!("date '{raw}' does not exist in New York time"),
        })
}

fn parse_hour(date: &str) -> Result<DateTime<Utc>> {
    let local = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M"))
        .map_err(|e| Error::Decode {
            provider: PROVIDER,
            message: format!("bad intraday date '{date}': {e}"),
        })?;
    new_york_to_utc(local, date)
}

fn parse_day(date: &str) -> Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| Error::Decode {
        provider: PROVIDER,
        message: format!("bad date '{date}': {e}"),
    })?;
    new_york_to_utc(day.and_time(chrono::NaiveTime::default()), date)
}

#[async_trait]
impl Fetcher for StockFetcher {
    fn asset_class(&self) -> AssetClass {
        AssetClass::Stock
    }

    async fn fetch(&self, timeframe: Timeframe, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        check_length(length)?;
        match timeframe {
            Timeframe::H4 => self.intraday(symbol, length).await,
            Timeframe::D1 | Timeframe::W1 => self.end_of_period(timeframe, symbol, length).await,
        }
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(rename = "Results", default)]
    results: Vec<Bar>,
}

#[derive(Debug, Clone, Deserialize)]
struct Bar {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Close")]
    close: f64,
}
