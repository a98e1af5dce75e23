use std::time::Duration;

use thiserror::Error;

use crate::{AssetClass, Timeframe};

/// Pipeline step an error happened in. Attached to per-ticker failures so the
/// caller knows what to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveClass,
    Fetch,
    StoreWindow,
    LoadSeries,
    Evaluate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ResolveClass => write!(f, "resolve class"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::StoreWindow => write!(f, "store window"),
            Stage::LoadSeries => write!(f, "load series"),
            Stage::Evaluate => write!(f, "evaluate"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("ticker {0} is not registered")]
    TickerNotFound(String),

    #[error("strategy {0} not found, check if strategy is registered")]
    StrategyNotFound(String),

    #[error("no data fetcher for class {0}")]
    NoFetcher(AssetClass),

    #[error("maximum length is {0}")]
    MaxLengthExceeded(usize),

    #[error("cant map crypto ticker {0}")]
    UnmappedSymbol(String),

    #[error("{provider} returned {got} rows, need {need}")]
    InsufficientData {
        provider: &'static str,
        got: usize,
        need: usize,
    },

    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{stage} {ticker} {timeframe}: {source}")]
    Stage {
        stage: Stage,
        ticker: String,
        timeframe: Timeframe,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap with the ticker, timeframe and stage the error occurred in.
    pub fn at(self, stage: Stage, ticker: &str, timeframe: Timeframe) -> Self {
        Error::Stage {
            stage,
            ticker: ticker.to_string(),
            timeframe,
            source: Box::new(self),
        }
    }

    /// True for errors caused by the request itself (rejected before any I/O).
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Validation(_) | Error::MaxLengthExceeded(_) => true,
            Error::Stage { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// The innermost error, skipping stage context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_context_prefixes_message() {
        let err = Error::MaxLengthExceeded(300).at(Stage::Fetch, "AAPL", Timeframe::D1);
        assert_eq!(err.to_string(), "fetch AAPL D1: maximum length is 300");
        assert!(err.is_client_error());
        assert!(matches!(err.root(), Error::MaxLengthExceeded(300)));
    }

    #[test]
    fn store_errors_are_server_errors() {
        let err = Error::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_client_error());
    }
}
