use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Maximum number of points kept per (ticker, timeframe) window, and the
/// maximum length any fetcher accepts.
pub const WINDOW_CAPACITY: usize = 300;

/// Sampling granularity of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::H4, Timeframe::D1, Timeframe::W1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            _ => Err(Error::Validation(format!(
                "valid timeframes: {:?}",
                Timeframe::ALL.map(|t| t.as_str())
            ))),
        }
    }
}

/// Asset class of a ticker. Selects the fetcher used to refresh it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 2] = [AssetClass::Stock, AssetClass::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Crypto => "crypto",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(AssetClass::Stock),
            "crypto" => Ok(AssetClass::Crypto),
            _ => Err(Error::Validation(format!(
                "valid classes: {:?}",
                AssetClass::ALL.map(|c| c.as_str())
            ))),
        }
    }
}

/// A registered instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub class: AssetClass,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>, class: AssetClass) -> Self {
        Self {
            symbol: symbol.into(),
            class,
        }
    }
}

/// Ticker + timeframe + strategy to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub ticker_symbol: String,
    pub timeframe: Timeframe,
    pub strategy: String,
}

impl Binding {
    pub fn new(ticker_symbol: impl Into<String>, timeframe: Timeframe, strategy: impl Into<String>) -> Self {
        Self {
            ticker_symbol: ticker_symbol.into(),
            timeframe,
            strategy: strategy.into(),
        }
    }
}

/// One point of a price series as returned by a fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(time: DateTime<Utc>, price: f64) -> Self {
        Self { time, price }
    }
}

/// A price point bound to its ticker, as written into a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub ticker_symbol: String,
    pub time: DateTime<Utc>,
    pub price: f64,
}

/// Result of refreshing one ticker's window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub ticker: String,
    pub class: AssetClass,
    pub timeframe: Timeframe,
    pub refreshed_prices: Vec<PricePoint>,
}

/// Conviction label attached to a strategy's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Key,
    #[serde(rename = "Very Weak")]
    VeryWeak,
    Weak,
    Neutral,
    Strong,
    #[serde(rename = "Very Strong")]
    VeryStrong,
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strength::Key => write!(f, "Key"),
            Strength::VeryWeak => write!(f, "Very Weak"),
            Strength::Weak => write!(f, "Weak"),
            Strength::Neutral => write!(f, "Neutral"),
            Strength::Strong => write!(f, "Strong"),
            Strength::VeryStrong => write!(f, "Very Strong"),
        }
    }
}

/// What a fulfilled signal asks the reader to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Notify,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "Buy"),
            Action::Sell => write!(f, "Sell"),
            Action::Notify => write!(f, "Notify"),
        }
    }
}

/// Output of one strategy evaluation. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub strategy: String,
    pub is_fulfilled: bool,
    pub evaluation_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<Strength>,
}

impl Verdict {
    pub fn new(strategy: impl Into<String>, is_fulfilled: bool, message: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            is_fulfilled,
            evaluation_message: message.into(),
            strength: None,
        }
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = Some(strength);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parse_rejects_unknown_with_valid_values() {
        let err = "M15".parse::<Timeframe>().unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), r#"valid timeframes: ["H4", "D1", "W1"]"#);
    }

    #[test]
    fn asset_class_round_trips_through_str() {
        for class in AssetClass::ALL {
            assert_eq!(class.as_str().parse::<AssetClass>().unwrap(), class);
        }
        assert!("forex".parse::<AssetClass>().is_err());
    }

    #[test]
    fn strength_serializes_with_spaces() {
        let json = serde_json::to_string(&Strength::VeryStrong).unwrap();
        assert_eq!(json, "\"Very Strong\"");
        assert_eq!(Strength::VeryWeak.to_string(), "Very Weak");
    }

    #[test]
    fn verdict_omits_missing_strength() {
        let v = Verdict::new("sma200", true, "ok");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["isFulfilled"], true);
        assert!(json.get("strength").is_none());
    }
}
