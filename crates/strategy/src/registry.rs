use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::info;

use common::{Action, Error, Result, Strength};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::rsi::{self, RsiStrategy};
use crate::sma::{self, SmaStrategy};
use crate::{FearGreedIndex, Strategy};

/// Runtime settings strategies need beyond their config entry.
#[derive(Debug, Clone)]
pub struct StrategyOptions {
    pub fng_api_url: String,
    pub sentiment_timeout: Duration,
}

/// Immutable name → strategy lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<Strategy>>,
}

impl StrategyRegistry {
    /// Build the registry from config. Unknown types, bad parameters and
    /// duplicate names are configuration errors.
    pub fn from_config(file_cfg: &StrategyFileConfig, opts: &StrategyOptions) -> Result<Self> {
        let mut strategies = BTreeMap::new();

        for cfg in &file_cfg.strategies {
            let strategy = build_strategy(cfg, opts)?;
            let name = strategy.name().to_string();
            if strategies.contains_key(&name) {
                return Err(Error::Config(format!("duplicate strategy name '{name}'")));
            }
            info!(name = %name, kind = %cfg.strategy_type, "Registered strategy");
            strategies.insert(name, Arc::new(strategy));
        }

        Ok(Self { strategies })
    }

    pub fn builtin(opts: &StrategyOptions) -> Result<Self> {
        Self::from_config(&StrategyFileConfig::builtin()?, opts)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| Error::StrategyNotFound(name.to_string()))
    }

    /// Strategy names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    /// Validate a binding request against the registry and the strategy's whitelist.
    pub fn check_binding(&self, strategy: &str, symbol: &str) -> Result<()> {
        let Some(s) = self.strategies.get(strategy) else {
            return Err(Error::Validation(format!("valid strategies: {:?}", self.names())));
        };

        match s.whitelist() {
            Some(allowed) if !allowed.iter().any(|a| a == symbol) => Err(Error::Validation(
                format!("valid symbols for strategy {strategy}: {allowed:?}"),
            )),
            _ => Ok(()),
        }
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(cfg: &StrategyConfig, opts: &StrategyOptions) -> Result<Strategy> {
    let mut strategy = match cfg.strategy_type.as_str() {
        "rsi" => {
            let level = required_f64(&cfg.params, "level")?;
            let strength: Strength = required_enum(&cfg.params, "strength")?;
            let action: Action = required_enum(&cfg.params, "action")?;
            let period = param_usize(&cfg.params, "period", rsi::DEFAULT_PERIOD);
            if period < 2 {
                return Err(Error::Config(format!("rsi period must be at least 2, got {period}")));
            }
            let tolerance = param_f64(&cfg.params, "tolerance", rsi::DEFAULT_ZONE_TOLERANCE);

            let s = RsiStrategy::new(level, strength, action)
                .with_period(period)
                .with_tolerance(tolerance);
            Strategy::Rsi(match &cfg.name {
                Some(name) => s.with_name(name.as_str()),
                None => s,
            })
        }
        "sma" => {
            let length = param_usize(&cfg.params, "length", 0);
            if length == 0 {
                return Err(Error::Config("sma requires a positive 'length'".into()));
            }
            let strength: Strength = required_enum(&cfg.params, "strength")?;
            let tolerance = param_f64(&cfg.params, "tolerance_pct", sma::DEFAULT_TOLERANCE_PCT);

            let s = SmaStrategy::new(length, strength).with_tolerance_pct(tolerance);
            Strategy::Sma(match &cfg.name {
                Some(name) => s.with_name(name.as_str()),
                None => s,
            })
        }
        "fng" => {
            let s = FearGreedIndex::new(opts.fng_api_url.as_str(), opts.sentiment_timeout)?;
            Strategy::FearGreed(match &cfg.name {
                Some(name) => s.with_name(name.as_str()),
                None => s,
            })
        }
        other => {
            return Err(Error::Config(format!(
                "unknown strategy type '{other}', expected rsi, sma or fng"
            )))
        }
    };

    // An explicit whitelist replaces the strategy's default.
    if !cfg.whitelist.is_empty() {
        strategy.set_whitelist(cfg.whitelist.iter().map(|s| s.to_uppercase()).collect());
    }
    Ok(strategy)
}

fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}

fn param_usize(params: &HashMap<String, toml::Value>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.as_integer())
        .map(|v| v.max(0) as usize)
        .unwrap_or(default)
}

fn required_f64(params: &HashMap<String, toml::Value>, key: &str) -> Result<f64> {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .ok_or_else(|| Error::Config(format!("missing numeric parameter '{key}'")))
}

fn required_enum<T: DeserializeOwned>(
    params: &HashMap<String, toml::Value>,
    key: &str,
) -> Result<T> {
    let value = params
        .get(key)
        .ok_or_else(|| Error::Config(format!("missing parameter '{key}'")))?;
    value
        .clone()
        .try_into()
        .map_err(|e| Error::Config(format!("invalid '{key}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> StrategyOptions {
        StrategyOptions {
            fng_api_url: "http://127.0.0.1:1/fng/".into(),
            sentiment_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn builtin_registers_all_names() {
        let reg = StrategyRegistry::builtin(&opts()).unwrap();
        assert_eq!(
            reg.names(),
            vec!["fng", "rsi20", "rsi30", "rsi40", "rsi70", "rsi80", "sma200"]
        );
    }

    #[test]
    fn builtin_rsi_parameters() {
        let reg = StrategyRegistry::builtin(&opts()).unwrap();
        let strategy = reg.get("rsi40").unwrap();
        let Strategy::Rsi(rsi40) = strategy.as_ref() else {
            panic!("rsi40 should be an RSI strategy");
        };
        assert_eq!(rsi40.strength, Strength::Key);
        assert_eq!(rsi40.action, Action::Buy);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let reg = StrategyRegistry::builtin(&opts()).unwrap();
        assert!(matches!(reg.get("macd"), Err(Error::StrategyNotFound(_))));
    }

    #[test]
    fn binding_checks_whitelist() {
        let reg = StrategyRegistry::builtin(&opts()).unwrap();
        assert!(reg.check_binding("fng", "BITCOIN").is_ok());
        assert!(reg.check_binding("rsi30", "AAPL").is_ok());

        let err = reg.check_binding("fng", "ETHEREUM").unwrap_err();
        assert_eq!(err.to_string(), "valid symbols for strategy fng: [\"BITCOIN\"]");
        assert!(err.is_client_error());

        let err = reg.check_binding("macd", "AAPL").unwrap_err();
        assert!(err.to_string().starts_with("valid strategies: ["));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let cfg = StrategyFileConfig::from_toml(
            r#"
            [[strategy]]
            type = "sma"
            [strategy.params]
            length = 50
            strength = "Strong"

            [[strategy]]
            type = "sma"
            [strategy.params]
            length = 50
            strength = "Weak"
            "#,
        )
        .unwrap();
        let err = StrategyRegistry::from_config(&cfg, &opts()).unwrap_err();
        assert!(err.to_string().contains("duplicate strategy name 'sma50'"));
    }

    #[test]
    fn bad_parameters_are_config_errors() {
        for body in [
            "[[strategy]]\ntype = \"macd\"\n",
            "[[strategy]]\ntype = \"rsi\"\n[strategy.params]\nlevel = 30\nstrength = \"Huge\"\naction = \"Buy\"\n",
            "[[strategy]]\ntype = \"rsi\"\n[strategy.params]\nlevel = 30\nstrength = \"Weak\"\naction = \"Buy\"\nperiod = 1\n",
            "[[strategy]]\ntype = \"sma\"\n[strategy.params]\nstrength = \"Weak\"\n",
        ] {
            let cfg = StrategyFileConfig::from_toml(body).unwrap();
            let err = StrategyRegistry::from_config(&cfg, &opts()).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{body}: {err}");
        }
    }

    #[test]
    fn integer_level_and_custom_name() {
        let cfg = StrategyFileConfig::from_toml(
            "[[strategy]]\ntype = \"rsi\"\nname = \"oversold\"\n[strategy.params]\nlevel = 25\nstrength = \"Weak\"\naction = \"Buy\"\n",
        )
        .unwrap();
        let reg = StrategyRegistry::from_config(&cfg, &opts()).unwrap();
        assert_eq!(reg.names(), vec!["oversold"]);
    }
}
