use chrono::{TimeZone, Utc};
use common::{AssetClass, PriceRow, RegistryStore, Ticker, Timeframe, WINDOW_CAPACITY};
use proptest::prelude::*;
use store::MemoryStore;

fn rows(start_day: i64, len: usize) -> Vec<PriceRow> {
    (0..len as i64)
        .map(|d| PriceRow {
            ticker_symbol: "AAPL".into(),
            time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::days(start_day + d),
            price: 1.0 + d as f64,
        })
        .collect()
}

proptest! {
    /// Deleting the K oldest then inserting K newer points never breaks the
    /// window capacity and keeps timestamps strictly ascending.
    #[test]
    fn rolling_window_count_matches_fifo_formula(
        existing in 0usize..=WINDOW_CAPACITY,
        fetched in 1usize..=WINDOW_CAPACITY,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = MemoryStore::new();
            store.insert_ticker(&Ticker::new("AAPL", AssetClass::Stock)).await.unwrap();

            let mut tx = store.begin_window().await.unwrap();
            tx.insert_points(Timeframe::D1, &rows(0, existing)).await.unwrap();
            tx.commit().await.unwrap();
            drop(tx);

            // The fetched points are all newer than anything stored.
            let mut tx = store.begin_window().await.unwrap();
            tx.delete_oldest("AAPL", Timeframe::D1, fetched).await.unwrap();
            tx.insert_points(Timeframe::D1, &rows(10_000, fetched)).await.unwrap();
            tx.commit().await.unwrap();
            drop(tx);

            let window = store.window("AAPL", Timeframe::D1).await;
            let expected = existing - fetched.min(existing) + fetched;
            assert_eq!(window.len(), expected);
            assert!(window.len() <= WINDOW_CAPACITY);
            assert!(window.windows(2).all(|w| w[0].time < w[1].time));
        });
    }
}
