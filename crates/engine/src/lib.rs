pub mod evaluate;
pub mod fetcher;
pub mod refresh;
pub mod window;

pub use evaluate::{Evaluation, Evaluator};
pub use fetcher::{CryptoFetcher, Fetcher, FetcherRegistry, StockFetcher};
pub use refresh::{RefreshFailure, Refresher, TimeframeRefresh};
pub use window::WindowStore;
