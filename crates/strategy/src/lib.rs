pub mod config;
pub mod fng;
pub mod indicators;
pub mod registry;
pub mod rsi;
pub mod sma;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use fng::FearGreedIndex;
pub use registry::{StrategyOptions, StrategyRegistry};
pub use rsi::RsiStrategy;
pub use sma::SmaStrategy;

use common::Verdict;

/// Every strategy the bot knows how to run.
#[derive(Debug, Clone)]
pub enum Strategy {
    Rsi(RsiStrategy),
    Sma(SmaStrategy),
    FearGreed(FearGreedIndex),
}

impl Strategy {
    /// Unique name used in bindings and reports.
    pub fn name(&self) -> &str {
        match self {
            Strategy::Rsi(s) => s.name(),
            Strategy::Sma(s) => s.name(),
            Strategy::FearGreed(s) => s.name(),
        }
    }

    /// Symbols this strategy may be bound to. `None` means any symbol.
    pub fn whitelist(&self) -> Option<&[String]> {
        let list = match self {
            Strategy::Rsi(s) => &s.whitelist,
            Strategy::Sma(s) => &s.whitelist,
            Strategy::FearGreed(s) => &s.whitelist,
        };
        (!list.is_empty()).then_some(list.as_slice())
    }

    /// Evaluate against an ascending price series.
    ///
    /// Never fails: problems are reported in the verdict message.
    pub async fn evaluate(&self, prices: &[f64]) -> Verdict {
        match self {
            Strategy::Rsi(s) => s.evaluate(prices),
            Strategy::Sma(s) => s.evaluate(prices),
            Strategy::FearGreed(s) => s.evaluate().await,
        }
    }

    pub(crate) fn set_whitelist(&mut self, symbols: Vec<String>) {
        let list = match self {
            Strategy::Rsi(s) => &mut s.whitelist,
            Strategy::Sma(s) => &mut s.whitelist,
            Strategy::FearGreed(s) => &mut s.whitelist,
        };
        *list = symbols;
    }
}
