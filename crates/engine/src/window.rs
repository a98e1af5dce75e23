use std::sync::Arc;

use tracing::debug;

use common::{
    with_deadline, Error, PricePoint, PriceRow, RegistryStore, Result, Timeframe, Timeouts,
};

/// Rolling-window contract over the registry store: at most `capacity` points
/// per (ticker, timeframe), oldest evicted first.
#[derive(Clone)]
pub struct WindowStore {
    store: Arc<dyn RegistryStore>,
    capacity: usize,
    timeouts: Timeouts,
}

impl WindowStore {
    pub fn new(store: Arc<dyn RegistryStore>, capacity: usize, timeouts: Timeouts) -> Self {
        Self {
            store,
            capacity,
            timeouts,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Evict as many oldest points as are being added, then insert `points`
    /// (ascending). Both steps commit together or not at all.
    pub async fn roll(&self, symbol: &str, timeframe: Timeframe, points: &[PricePoint]) -> Result<()> {
        if points.len() > self.capacity {
            return Err(Error::MaxLengthExceeded(self.capacity));
        }

        let rows: Vec<PriceRow> = points
            .iter()
            .map(|p| PriceRow {
                ticker_symbol: symbol.to_string(),
                time: p.time,
                price: p.price,
            })
            .collect();

        // Dropping the transaction on timeout rolls it back.
        with_deadline("store write", self.timeouts.store_write, async {
            let mut tx = self.store.begin_window().await?;
            let removed = tx.delete_oldest(symbol, timeframe, rows.len()).await?;
            tx.insert_points(timeframe, &rows).await?;
            tx.commit().await?;

            debug!(
                ticker = %symbol,
                timeframe = %timeframe,
                removed,
                inserted = rows.len(),
                "Window rolled"
            );
            Ok(())
        })
        .await
    }

    /// Stored prices, oldest first.
    pub async fn series(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<f64>> {
        with_deadline(
            "store read",
            self.timeouts.store_read,
            self.store.price_series(symbol, timeframe),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{AssetClass, Ticker};
    use store::MemoryStore;

    fn points(start_hour: i64, n: usize) -> Vec<PricePoint> {
        (0..n)
            .map(|i| {
                let t = Utc.timestamp_opt((start_hour + i as i64) * 3600, 0).unwrap();
                PricePoint::new(t, i as f64)
            })
            .collect()
    }

    async fn window() -> (MemoryStore, WindowStore) {
        let mem = MemoryStore::new();
        mem.insert_ticker(&Ticker::new("AAPL", AssetClass::Stock)).await.unwrap();
        let ws = WindowStore::new(Arc::new(mem.clone()), 5, Timeouts::default());
        (mem, ws)
    }

    #[tokio::test]
    async fn roll_keeps_capacity_and_order() {
        let (mem, ws) = window().await;
        ws.roll("AAPL", Timeframe::D1, &points(0, 4)).await.unwrap();
        ws.roll("AAPL", Timeframe::D1, &points(10, 2)).await.unwrap();

        let rows = mem.window("AAPL", Timeframe::D1).await;
        // 4 existing - 2 evicted + 2 new
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(ws.series("AAPL", Timeframe::D1).await.unwrap(), vec![2.0, 3.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_untouched() {
        let (mem, ws) = window().await;
        ws.roll("AAPL", Timeframe::D1, &points(0, 3)).await.unwrap();

        let err = ws.roll("AAPL", Timeframe::D1, &points(10, 6)).await.unwrap_err();
        assert!(matches!(err, Error::MaxLengthExceeded(5)));
        assert_eq!(mem.window("AAPL", Timeframe::D1).await.len(), 3);
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_eviction() {
        let (mem, ws) = window().await;
        ws.roll("AAPL", Timeframe::D1, &points(0, 3)).await.unwrap();
        mem.fail_writes_for("AAPL").await;

        assert!(ws.roll("AAPL", Timeframe::D1, &points(10, 2)).await.is_err());
        assert_eq!(ws.series("AAPL", Timeframe::D1).await.unwrap(), vec![0.0, 1.0, 2.0]);
    }
}
