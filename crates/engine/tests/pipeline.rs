use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    AssetClass, Binding, Error, PricePoint, RegistryStore, Result, Stage, Ticker, Timeframe,
    Timeouts, WINDOW_CAPACITY,
};
use engine::{Evaluator, Fetcher, FetcherRegistry, Refresher, WindowStore};
use store::MemoryStore;
use strategy::{StrategyOptions, StrategyRegistry};

/// Deterministic fetcher: `length` daily points with rising prices.
struct StubFetcher {
    class: AssetClass,
    failing: HashSet<String>,
}

impl StubFetcher {
    fn stock() -> Self {
        Self {
            class: AssetClass::Stock,
            failing: HashSet::new(),
        }
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    fn asset_class(&self) -> AssetClass {
        self.class
    }

    async fn fetch(&self, _timeframe: Timeframe, symbol: &str, length: usize) -> Result<Vec<PricePoint>> {
        if self.failing.contains(symbol) {
            return Err(Error::Provider {
                provider: "stub",
                message: format!("no data for {symbol}"),
            });
        }
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0..length)
            .map(|i| PricePoint::new(start + chrono::Duration::days(i as i64), 100.0 + i as f64))
            .collect())
    }
}

struct Harness {
    mem: MemoryStore,
    refresher: Refresher,
    evaluator: Evaluator,
}

fn strategy_opts(url: &str) -> StrategyOptions {
    StrategyOptions {
        fng_api_url: url.to_string(),
        sentiment_timeout: Duration::from_secs(5),
    }
}

fn harness_with(fetcher: StubFetcher, strategies: StrategyRegistry, timeouts: Timeouts) -> Harness {
    let mem = MemoryStore::new();
    let store: Arc<dyn RegistryStore> = Arc::new(mem.clone());
    let window = Arc::new(WindowStore::new(store.clone(), WINDOW_CAPACITY, timeouts));
    let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
    let fetchers = Arc::new(FetcherRegistry::new(vec![fetcher]));

    Harness {
        refresher: Refresher::new(store.clone(), fetchers, window.clone(), timeouts),
        evaluator: Evaluator::new(store, Arc::new(strategies), window, timeouts),
        mem,
    }
}

fn harness(fetcher: StubFetcher) -> Harness {
    let strategies = StrategyRegistry::builtin(&strategy_opts("http://127.0.0.1:1/fng/")).unwrap();
    harness_with(fetcher, strategies, Timeouts::default())
}

async fn register(mem: &MemoryStore, symbol: &str, class: AssetClass, strategies: &[&str]) {
    mem.insert_ticker(&Ticker::new(symbol, class)).await.unwrap();
    for s in strategies {
        mem.insert_binding(&Binding::new(symbol, Timeframe::D1, *s)).await.unwrap();
    }
}

#[tokio::test]
async fn refresh_by_timeframe_isolates_failures() {
    let h = harness(StubFetcher::stock().failing("BBB"));
    for symbol in ["AAA", "BBB", "CCC"] {
        register(&h.mem, symbol, AssetClass::Stock, &["rsi30"]).await;
    }

    let report = h.refresher.refresh_by_timeframe(Timeframe::D1).await.unwrap();

    let refreshed: Vec<&str> = report.refreshed.iter().map(|s| s.ticker.as_str()).collect();
    assert_eq!(refreshed, vec!["AAA", "CCC"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].ticker, "BBB");

    let err = report.first_error().unwrap();
    assert!(matches!(err, Error::Stage { stage: Stage::Fetch, .. }));
    assert_eq!(err.to_string(), "fetch BBB D1: stub error: no data for BBB");

    assert_eq!(h.mem.window("AAA", Timeframe::D1).await.len(), WINDOW_CAPACITY);
    assert!(h.mem.window("BBB", Timeframe::D1).await.is_empty());
}

#[tokio::test]
async fn refresh_by_timeframe_ignores_other_timeframes() {
    let h = harness(StubFetcher::stock());
    h.mem.insert_ticker(&Ticker::new("AAA", AssetClass::Stock)).await.unwrap();
    h.mem
        .insert_binding(&Binding::new("AAA", Timeframe::W1, "rsi30"))
        .await
        .unwrap();

    let report = h.refresher.refresh_by_timeframe(Timeframe::D1).await.unwrap();
    assert!(report.refreshed.is_empty());
    assert!(report.is_complete());
}

#[tokio::test]
async fn refresh_one_is_idempotent() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "AAA", AssetClass::Stock, &[]).await;

    let first = h.refresher.refresh_one("AAA", Timeframe::D1).await.unwrap();
    let after_first = h.mem.window("AAA", Timeframe::D1).await;
    h.refresher.refresh_one("AAA", Timeframe::D1).await.unwrap();
    let after_second = h.mem.window("AAA", Timeframe::D1).await;

    assert_eq!(first.refreshed_prices.len(), WINDOW_CAPACITY);
    assert_eq!(first.class, AssetClass::Stock);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn refresh_one_unknown_ticker() {
    let h = harness(StubFetcher::stock());
    let err = h.refresher.refresh_one("NOPE", Timeframe::D1).await.unwrap_err();
    assert!(matches!(err.root(), Error::TickerNotFound(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn missing_fetcher_is_terminal() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "BITCOIN", AssetClass::Crypto, &[]).await;

    let err = h.refresher.refresh_one("BITCOIN", Timeframe::D1).await.unwrap_err();
    assert!(matches!(err.root(), Error::NoFetcher(AssetClass::Crypto)));
}

#[tokio::test]
async fn preview_does_not_store() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "AAA", AssetClass::Stock, &[]).await;

    let points = h.refresher.preview("AAA", Timeframe::D1).await.unwrap();
    assert_eq!(points.len(), WINDOW_CAPACITY);
    assert!(h.mem.window("AAA", Timeframe::D1).await.is_empty());
}

#[tokio::test]
async fn evaluate_keeps_binding_order() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "AAA", AssetClass::Stock, &["rsi70", "sma200", "rsi30"]).await;
    register(&h.mem, "CCC", AssetClass::Stock, &["rsi30"]).await;
    h.refresher.refresh_by_timeframe(Timeframe::D1).await.unwrap();

    let results = h.evaluator.evaluate(Timeframe::D1).await.unwrap();

    let names: Vec<&str> = results["AAA"].iter().map(|v| v.strategy.as_str()).collect();
    assert_eq!(names, vec!["rsi70", "sma200", "rsi30"]);
    // Strictly rising series: RSI 100
    assert!(results["AAA"][0].is_fulfilled);
    assert!(!results["AAA"][2].is_fulfilled);
    assert_eq!(results["CCC"].len(), 1);
}

#[tokio::test]
async fn evaluate_is_all_or_nothing() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "AAA", AssetClass::Stock, &["rsi30"]).await;
    register(&h.mem, "BBB", AssetClass::Stock, &["rsi30"]).await;
    h.refresher.refresh_by_timeframe(Timeframe::D1).await.unwrap();
    h.mem.fail_reads_for("BBB").await;

    let err = h.evaluator.evaluate(Timeframe::D1).await.unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::LoadSeries, ref ticker, .. } if ticker == "BBB"));
}

#[tokio::test]
async fn evaluate_unknown_strategy_fails_run() {
    let h = harness(StubFetcher::stock());
    register(&h.mem, "AAA", AssetClass::Stock, &["rsi30", "macd"]).await;

    let err = h.evaluator.evaluate(Timeframe::D1).await.unwrap_err();
    assert!(matches!(err.root(), Error::StrategyNotFound(name) if name == "macd"));
}

#[tokio::test]
async fn evaluate_empty_timeframe() {
    let h = harness(StubFetcher::stock());
    assert!(h.evaluator.evaluate(Timeframe::H4).await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_sentiment_hits_evaluate_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [{"value": "10", "value_classification": "Extreme Fear"}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let strategies =
        StrategyRegistry::builtin(&strategy_opts(&format!("{}/fng/", server.uri()))).unwrap();
    let timeouts = Timeouts {
        evaluate_ticker: Duration::from_millis(200),
        ..Timeouts::default()
    };
    let h = harness_with(StubFetcher::stock(), strategies, timeouts);
    register(&h.mem, "BITCOIN", AssetClass::Stock, &["rsi30", "fng"]).await;

    let err = h.evaluator.evaluate(Timeframe::D1).await.unwrap_err();
    assert!(matches!(err.root(), Error::Timeout { what: "evaluate ticker", .. }));
}
