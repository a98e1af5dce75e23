use async_trait::async_trait;

use crate::{AssetClass, Binding, PriceRow, Result, Ticker, Timeframe};

/// Abstraction over the registry store.
///
/// `SqliteStore` implements this for production, `MemoryStore` for tests and
/// local runs. Window mutation only happens through a `WindowTx` so that the
/// delete-oldest / insert-newest pair commits together or not at all.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn insert_ticker(&self, ticker: &Ticker) -> Result<()>;

    async fn tickers(&self) -> Result<Vec<Ticker>>;

    /// Fails with `Error::TickerNotFound` for unregistered symbols.
    async fn asset_class(&self, symbol: &str) -> Result<AssetClass>;

    /// Distinct tickers with at least one binding on `timeframe`, ordered by symbol.
    async fn tickers_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Ticker>>;

    /// Inserting an existing (ticker, timeframe, strategy) triple is a no-op.
    async fn insert_binding(&self, binding: &Binding) -> Result<()>;

    async fn bindings_for_ticker(&self, symbol: &str) -> Result<Vec<Binding>>;

    async fn bindings_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Binding>>;

    /// Stored prices for the window, oldest first.
    async fn price_series(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<f64>>;

    /// Open a window transaction. Dropping it without `commit` rolls back.
    async fn begin_window(&self) -> Result<Box<dyn WindowTx>>;

    async fn ping(&self) -> Result<()>;
}

/// A single atomic window mutation scope.
#[async_trait]
pub trait WindowTx: Send {
    /// Delete up to `count` oldest points of the window. Returns rows removed.
    async fn delete_oldest(&mut self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<u64>;

    /// Insert points; each row carries its own symbol. A row whose timestamp
    /// already exists overwrites the stored price.
    async fn insert_points(&mut self, timeframe: Timeframe, rows: &[PriceRow]) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;
}
