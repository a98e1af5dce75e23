use std::str::FromStr;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use common::{
    AssetClass, Binding, Error, PriceRow, RegistryStore, Result, Ticker, Timeframe, WindowTx,
};

/// Registry store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` with foreign keys on.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new().connect_with(options).await?;
        info!(%url, "Connected to SQLite");
        Ok(Self { db })
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.db)
            .await
            .map_err(|e| Error::Other(format!("database migration failed: {e}")))?;
        Ok(())
    }

    #[cfg(test)]
    fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

fn parse_class(symbol: &str, raw: &str) -> Result<AssetClass> {
    AssetClass::from_str(raw)
        .map_err(|_| Error::Other(format!("stored class '{raw}' for {symbol} is invalid")))
}

fn parse_binding((ticker_symbol, timeframe, strategy): (String, String, String)) -> Result<Binding> {
    let timeframe = Timeframe::from_str(&timeframe)
        .map_err(|_| Error::Other(format!("stored timeframe '{timeframe}' is invalid")))?;
    Ok(Binding {
        ticker_symbol,
        timeframe,
        strategy,
    })
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn insert_ticker(&self, ticker: &Ticker) -> Result<()> {
        sqlx::query(r#"INSERT INTO ticker (symbol, class) VALUES (?1, ?2)"#)
            .bind(&ticker.symbol)
            .bind(ticker.class.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as(r#"SELECT symbol, class FROM ticker ORDER BY symbol"#)
                .fetch_all(&self.db)
                .await?;

        rows.into_iter()
            .map(|(symbol, class)| {
                let class = parse_class(&symbol, &class)?;
                Ok(Ticker { symbol, class })
            })
            .collect()
    }

    async fn asset_class(&self, symbol: &str) -> Result<AssetClass> {
        let class: Option<String> =
            sqlx::query_scalar(r#"SELECT class FROM ticker WHERE symbol = ?1"#)
                .bind(symbol)
                .fetch_optional(&self.db)
                .await?;

        match class {
            Some(class) => parse_class(symbol, &class),
            None => Err(Error::TickerNotFound(symbol.to_string())),
        }
    }

    async fn tickers_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Ticker>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT t.symbol, t.class
            FROM ticker t JOIN binding b ON t.symbol = b.ticker_symbol
            WHERE b.timeframe = ?1
            ORDER BY t.symbol
            "#,
        )
        .bind(timeframe.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(symbol, class)| {
                let class = parse_class(&symbol, &class)?;
                Ok(Ticker { symbol, class })
            })
            .collect()
    }

    async fn insert_binding(&self, binding: &Binding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO binding (ticker_symbol, timeframe, strategy)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(ticker_symbol, timeframe, strategy) DO NOTHING
            "#,
        )
        .bind(&binding.ticker_symbol)
        .bind(binding.timeframe.as_str())
        .bind(&binding.strategy)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn bindings_for_ticker(&self, symbol: &str) -> Result<Vec<Binding>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"SELECT ticker_symbol, timeframe, strategy FROM binding WHERE ticker_symbol = ?1 ORDER BY rowid"#,
        )
        .bind(symbol)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(parse_binding).collect()
    }

    async fn bindings_for_timeframe(&self, timeframe: Timeframe) -> Result<Vec<Binding>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"SELECT ticker_symbol, timeframe, strategy FROM binding WHERE timeframe = ?1 ORDER BY rowid"#,
        )
        .bind(timeframe.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(parse_binding).collect()
    }

    async fn price_series(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<f64>> {
        let prices: Vec<f64> = sqlx::query_scalar(
            r#"SELECT price FROM price WHERE ticker_symbol = ?1 AND timeframe = ?2 ORDER BY time ASC"#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .fetch_all(&self.db)
        .await?;
        Ok(prices)
    }

    async fn begin_window(&self) -> Result<Box<dyn WindowTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(SqliteWindowTx { tx: Some(tx) }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query(r#"SELECT symbol FROM ticker LIMIT 1"#)
            .fetch_optional(&self.db)
            .await?;
        Ok(())
    }
}

/// Window mutation inside one SQLite transaction. sqlx rolls back on drop.
struct SqliteWindowTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteWindowTx {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::Other("window transaction already committed".into()))
    }
}

#[async_trait]
impl WindowTx for SqliteWindowTx {
    async fn delete_oldest(&mut self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<u64> {
        let tx = self.tx()?;
        let res = sqlx::query(
            r#"
            DELETE FROM price
            WHERE rowid IN (
                SELECT rowid FROM price
                WHERE ticker_symbol = ?1 AND timeframe = ?2
                ORDER BY time ASC
                LIMIT ?3
            )
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(count as i64)
        .execute(&mut **tx)
        .await?;

        debug!(ticker = %symbol, %timeframe, deleted = res.rows_affected(), "Deleted oldest points");
        Ok(res.rows_affected())
    }

    async fn insert_points(&mut self, timeframe: Timeframe, rows: &[PriceRow]) -> Result<()> {
        let tx = self.tx()?;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO price (ticker_symbol, timeframe, time, price)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(ticker_symbol, timeframe, time) DO UPDATE SET price = excluded.price
                "#,
            )
            .bind(&row.ticker_symbol)
            .bind(timeframe.as_str())
            .bind(row.time.timestamp_millis())
            .bind(row.price)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Other("window transaction already committed".into()))?;
        tx.commit().await?;
        Ok(())
    }
}

/// Read back a window with timestamps, oldest first. Used by tests and tooling.
pub async fn window_rows(
    db: &SqlitePool,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Vec<PriceRow>> {
    let rows: Vec<(i64, f64)> = sqlx::query_as(
        r#"SELECT time, price FROM price WHERE ticker_symbol = ?1 AND timeframe = ?2 ORDER BY time ASC"#,
    )
    .bind(symbol)
    .bind(timeframe.as_str())
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|(millis, price)| {
            let time = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| Error::Other(format!("stored time {millis} is out of range")))?;
            Ok(PriceRow {
                ticker_symbol: symbol.to_string(),
                time,
                price,
            })
        })
        .collect()
}
