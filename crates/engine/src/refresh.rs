use std::sync::Arc;

use tracing::{info, warn};

use common::{
    with_deadline, Error, PricePoint, RefreshSummary, RegistryStore, Result, Stage, Ticker,
    Timeframe, Timeouts,
};

use crate::fetcher::FetcherRegistry;
use crate::window::WindowStore;

/// A ticker whose refresh failed during a timeframe-wide run.
#[derive(Debug)]
pub struct RefreshFailure {
    pub ticker: String,
    pub error: Error,
}

/// Outcome of refreshing every ticker bound to a timeframe. Both lists are in
/// ticker order.
#[derive(Debug, Default)]
pub struct TimeframeRefresh {
    pub refreshed: Vec<RefreshSummary>,
    pub failures: Vec<RefreshFailure>,
}

impl TimeframeRefresh {
    /// The surfaced error: the first failure in ticker order.
    pub fn first_error(&self) -> Option<&Error> {
        self.failures.first().map(|f| &f.error)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches fresh series and rolls them into the store.
#[derive(Clone)]
pub struct Refresher {
    store: Arc<dyn RegistryStore>,
    fetchers: Arc<FetcherRegistry>,
    window: Arc<WindowStore>,
    timeouts: Timeouts,
}

impl Refresher {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        fetchers: Arc<FetcherRegistry>,
        window: Arc<WindowStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            fetchers,
            window,
            timeouts,
        }
    }

    /// Refresh one registered ticker's window for `timeframe`.
    pub async fn refresh_one(&self, symbol: &str, timeframe: Timeframe) -> Result<RefreshSummary> {
        let ticker = self.resolve(symbol, timeframe).await?;
        self.refresh_ticker(&ticker, timeframe).await
    }

    /// Refresh a ticker whose class is already known.
    pub async fn refresh_ticker(&self, ticker: &Ticker, timeframe: Timeframe) -> Result<RefreshSummary> {
        let points = self.fetch(ticker, timeframe, self.window.capacity()).await?;

        self.window
            .roll(&ticker.symbol, timeframe, &points)
            .await
            .map_err(|e| e.at(Stage::StoreWindow, &ticker.symbol, timeframe))?;

        info!(
            ticker = %ticker.symbol,
            timeframe = %timeframe,
            points = points.len(),
            "Refreshed price window"
        );

        Ok(RefreshSummary {
            ticker: ticker.symbol.clone(),
            class: ticker.class,
            timeframe,
            refreshed_prices: points,
        })
    }

    /// Refresh every ticker bound to `timeframe`, one task per ticker.
    ///
    /// A failing ticker does not stop the others. Only failing to list the
    /// tickers fails the whole call.
    pub async fn refresh_by_timeframe(&self, timeframe: Timeframe) -> Result<TimeframeRefresh> {
        let tickers = with_deadline(
            "store read",
            self.timeouts.store_read,
            self.store.tickers_for_timeframe(timeframe),
        )
        .await?;

        info!(timeframe = %timeframe, tickers = tickers.len(), "Refreshing timeframe");

        let handles: Vec<_> = tickers
            .into_iter()
            .map(|ticker| {
                let this = self.clone();
                let symbol = ticker.symbol.clone();
                let handle = tokio::spawn(async move {
                    with_deadline(
                        "refresh ticker",
                        this.timeouts.refresh_ticker,
                        this.refresh_ticker(&ticker, timeframe),
                    )
                    .await
                });
                (symbol, handle)
            })
            .collect();

        let mut report = TimeframeRefresh::default();
        for (symbol, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                Err(Error::Other(format!("refresh task for {symbol} failed: {e}")))
            });

            match outcome {
                Ok(summary) => report.refreshed.push(summary),
                Err(error) => {
                    warn!(ticker = %symbol, timeframe = %timeframe, error = %error, "Refresh failed");
                    report.failures.push(RefreshFailure {
                        ticker: symbol,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Fetch a full window for a registered ticker without storing it.
    pub async fn preview(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<PricePoint>> {
        let ticker = self.resolve(symbol, timeframe).await?;
        self.fetch(&ticker, timeframe, self.window.capacity()).await
    }

    async fn resolve(&self, symbol: &str, timeframe: Timeframe) -> Result<Ticker> {
        let class = with_deadline(
            "store read",
            self.timeouts.store_read,
            self.store.asset_class(symbol),
        )
        .await
        .map_err(|e| e.at(Stage::ResolveClass, symbol, timeframe))?;

        Ok(Ticker::new(symbol, class))
    }

    async fn fetch(&self, ticker: &Ticker, timeframe: Timeframe, length: usize) -> Result<Vec<PricePoint>> {
        let fetcher = self
            .fetchers
            .get(ticker.class)
            .ok_or(Error::NoFetcher(ticker.class))
            .map_err(|e| e.at(Stage::ResolveClass, &ticker.symbol, timeframe))?;

        with_deadline(
            "fetch",
            self.timeouts.fetch,
            fetcher.fetch(timeframe, &ticker.symbol, length),
        )
        .await
        .map_err(|e| e.at(Stage::Fetch, &ticker.symbol, timeframe))
    }
}
