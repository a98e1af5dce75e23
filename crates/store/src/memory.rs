use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use common::{
    AssetClass, Binding, Error, PriceRow, RegistryStore, Result, Ticker, Timeframe, WindowTx,
};

type WindowKey = (String, Timeframe);
type Window = BTreeMap<DateTime<Utc>, f64>;

#[derive(Default)]
struct State {
    tickers: BTreeMap<String, AssetClass>,
    bindings: Vec<Binding>,
    windows: HashMap<WindowKey, Window>,
    /// Symbols whose window inserts fail (simulated write errors).
    failing_writes: HashSet<String>,
    /// Symbols whose series reads fail (simulated read errors).
    failing_reads: HashSet<String>,
}

/// In-memory registry store with the same transactional window semantics as
/// `SqliteStore`. A window transaction works on a staged copy and holds the
/// store lock until it commits or is dropped.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent window insert for `symbol` fail.
    pub async fn fail_writes_for(&self, symbol: &str) {
        self.state.lock().await.failing_writes.insert(symbol.to_string());
    }

    /// Make every subsequent series read for `symbol` fail.
    pub async fn fail_reads_for(&self, symbol: &str) {
        self.state.lock().await.failing_reads.insert(symbol.to_string());
    }

    /// Snapshot of a stored window, oldest first.
    pub async fn window(&self, symbol: &str, timeframe: Timeframe) -> Vec<PriceRow> {
        let state = self.state.lock().await;
        state
            .windows
            .get(&(symbol.to_string(), timeframe))
            .map(|w| {
                w.iter()
                    .map(|(time, price)| PriceRow {
                        ticker_symbol: symbol.to_string(),
                        time: *time,
                        price: *price,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn insert_ticker(&self, ticker: &Ticker) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.tickers.contains_key(&ticker.symbol) {
            return Err(Error::Other(format!("ticker {} already registered", ticker.symbol)));
        }
        state.tickers.insert(ticker.symbol.clone(), ticker.class);
        Ok(())
    }

    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let state = self.state.lock().await;
        Ok(state
            .tickers
            .iter()
            .map(|(symbol, class)| Ticker::new(symbol.clone(), *class))
            .collect())
    }

    async fn asset_class(&self, symbol: &str) -> Result<AssetClass> {
        let state = self.state.lock().await;
        state
            .tickers
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::TickerNotFound(symbol.to_string()))
    }

    async fn tickers_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Ticker>> {
        let state = self.state.lock().await;
        let symbols: HashSet<&str> = state
            .bindings
            .iter()
            .filter(|b| b.timeframe == timeframe)
            .map(|b| b.ticker_symbol.as_str())
            .collect();

        Ok(state
            .tickers
            .iter()
            .filter(|(symbol, _)| symbols.contains(symbol.as_str()))
            .map(|(symbol, class)| Ticker::new(symbol.clone(), *class))
            .collect())
    }

    async fn insert_binding(&self, binding: &Binding) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.tickers.contains_key(&binding.ticker_symbol) {
            return Err(Error::TickerNotFound(binding.ticker_symbol.clone()));
        }
        if !state.bindings.contains(binding) {
            state.bindings.push(binding.clone());
        }
        Ok(())
    }

    async fn bindings_for_ticker(&self, symbol: &str) -> Result<Vec<Binding>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .iter()
            .filter(|b| b.ticker_symbol == symbol)
            .cloned()
            .collect())
    }

    async fn bindings_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Binding>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .iter()
            .filter(|b| b.timeframe == timeframe)
            .cloned()
            .collect())
    }

    async fn price_series(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<f64>> {
        let state = self.state.lock().await;
        if state.failing_reads.contains(symbol) {
            return Err(Error::Other(format!("simulated read failure for {symbol}")));
        }
        Ok(state
            .windows
            .get(&(symbol.to_string(), timeframe))
            .map(|w| w.values().copied().collect())
            .unwrap_or_default())
    }

    async fn begin_window(&self) -> Result<Box<dyn WindowTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.windows.clone();
        Ok(Box::new(MemoryWindowTx {
            guard,
            staged,
            committed: false,
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryWindowTx {
    guard: OwnedMutexGuard<State>,
    staged: HashMap<WindowKey, Window>,
    committed: bool,
}

impl MemoryWindowTx {
    fn ensure_open(&self) -> Result<()> {
        if self.committed {
            return Err(Error::Other("window transaction already committed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WindowTx for MemoryWindowTx {
    async fn delete_oldest(&mut self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<u64> {
        self.ensure_open()?;
        let Some(window) = self.staged.get_mut(&(symbol.to_string(), timeframe)) else {
            return Ok(0);
        };
        let doomed: Vec<DateTime<Utc>> = window.keys().take(count).copied().collect();
        for time in &doomed {
            window.remove(time);
        }
        Ok(doomed.len() as u64)
    }

    async fn insert_points(&mut self, timeframe: Timeframe, rows: &[PriceRow]) -> Result<()> {
        self.ensure_open()?;
        for row in rows {
            if !self.guard.tickers.contains_key(&row.ticker_symbol) {
                return Err(Error::TickerNotFound(row.ticker_symbol.clone()));
            }
            if self.guard.failing_writes.contains(&row.ticker_symbol) {
                return Err(Error::Other(format!(
                    "simulated write failure for {}",
                    row.ticker_symbol
                )));
            }
            self.staged
                .entry((row.ticker_symbol.clone(), timeframe))
                .or_default()
                .insert(row.time, row.price);
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.guard.windows = std::mem::take(&mut self.staged);
        self.committed = true;
        debug!("Memory window transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rows(symbol: &str, days: std::ops::Range<i64>) -> Vec<PriceRow> {
        days.map(|d| PriceRow {
            ticker_symbol: symbol.to_string(),
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(d),
            price: d as f64,
        })
        .collect()
    }

    #[tokio::test]
    async fn binding_requires_registered_ticker() {
        let store = MemoryStore::new();
        let err = store
            .insert_binding(&Binding::new("AAPL", Timeframe::D1, "rsi30"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TickerNotFound(_)));
    }

    #[tokio::test]
    async fn uncommitted_tx_leaves_window_untouched() {
        let store = MemoryStore::new();
        store.insert_ticker(&Ticker::new("AAPL", AssetClass::Stock)).await.unwrap();
        let mut tx = store.begin_window().await.unwrap();
        tx.insert_points(Timeframe::D1, &rows("AAPL", 0..4)).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        {
            let mut tx = store.begin_window().await.unwrap();
            tx.delete_oldest("AAPL", Timeframe::D1, 4).await.unwrap();
        }

        assert_eq!(store.window("AAPL", Timeframe::D1).await.len(), 4);
    }

    #[tokio::test]
    async fn failing_write_aborts_without_commit() {
        let store = MemoryStore::new();
        store.insert_ticker(&Ticker::new("AAPL", AssetClass::Stock)).await.unwrap();
        store.fail_writes_for("AAPL").await;

        let mut tx = store.begin_window().await.unwrap();
        tx.delete_oldest("AAPL", Timeframe::D1, 10).await.unwrap();
        assert!(tx.insert_points(Timeframe::D1, &rows("AAPL", 0..1)).await.is_err());
    }

    #[tokio::test]
    async fn commit_twice_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin_window().await.unwrap();
        tx.commit().await.unwrap();
        assert!(tx.commit().await.is_err());
    }
}
