use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinSet;
use tracing::{info, warn};

use common::{with_deadline, Error, RegistryStore, Result, Stage, Timeframe, Timeouts, Verdict};
use strategy::{Strategy, StrategyRegistry};

use crate::window::WindowStore;

/// Verdicts per ticker symbol, each list in binding order.
pub type Evaluation = BTreeMap<String, Vec<Verdict>>;

/// Runs bound strategies over stored windows.
#[derive(Clone)]
pub struct Evaluator {
    store: Arc<dyn RegistryStore>,
    strategies: Arc<StrategyRegistry>,
    window: Arc<WindowStore>,
    timeouts: Timeouts,
}

impl Evaluator {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        strategies: Arc<StrategyRegistry>,
        window: Arc<WindowStore>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            strategies,
            window,
            timeouts,
        }
    }

    /// Evaluate every binding on `timeframe`.
    ///
    /// All or nothing: the first ticker failure aborts the remaining tasks and
    /// is returned instead of a partial map.
    pub async fn evaluate(&self, timeframe: Timeframe) -> Result<Evaluation> {
        let bindings = with_deadline(
            "store read",
            self.timeouts.store_read,
            self.store.bindings_for_timeframe(timeframe),
        )
        .await?;

        let mut per_ticker: BTreeMap<String, Vec<Arc<Strategy>>> = BTreeMap::new();
        for binding in bindings {
            let strategy = self
                .strategies
                .get(&binding.strategy)
                .map_err(|e| e.at(Stage::Evaluate, &binding.ticker_symbol, timeframe))?;
            per_ticker.entry(binding.ticker_symbol).or_default().push(strategy);
        }

        info!(timeframe = %timeframe, tickers = per_ticker.len(), "Evaluating timeframe");

        let mut tasks = JoinSet::new();
        for (symbol, strategies) in per_ticker {
            let this = self.clone();
            tasks.spawn(async move {
                let verdicts = with_deadline(
                    "evaluate ticker",
                    this.timeouts.evaluate_ticker,
                    this.evaluate_ticker(&symbol, timeframe, &strategies),
                )
                .await
                .map_err(|e| match e {
                    Error::Timeout { .. } => e.at(Stage::Evaluate, &symbol, timeframe),
                    other => other,
                })?;
                Ok::<_, Error>((symbol, verdicts))
            });
        }

        let mut results = Evaluation::new();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| Error::Other(format!("evaluation task failed: {e}")))
                .and_then(|res| res);

            match outcome {
                Ok((symbol, verdicts)) => {
                    results.insert(symbol, verdicts);
                }
                Err(e) => {
                    warn!(timeframe = %timeframe, error = %e, "Evaluation failed");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(results)
    }

    async fn evaluate_ticker(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        strategies: &[Arc<Strategy>],
    ) -> Result<Vec<Verdict>> {
        let series = self
            .window
            .series(symbol, timeframe)
            .await
            .map_err(|e| e.at(Stage::LoadSeries, symbol, timeframe))?;

        let verdicts = join_all(strategies.iter().map(|s| s.evaluate(&series))).await;

        let fulfilled = verdicts.iter().filter(|v| v.is_fulfilled).count();
        info!(
            ticker = %symbol,
            timeframe = %timeframe,
            points = series.len(),
            fulfilled,
            "Evaluated ticker"
        );
        Ok(verdicts)
    }
}
