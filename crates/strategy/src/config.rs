use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result};

/// Built-in strategy set, used when no config file is present.
const BUILTIN: &str = include_str!("../../../config/strategies.toml");

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "rsi"
///
/// [strategy.params]
/// level = 30.0
/// strength = "Strong"
/// action = "Buy"
///
/// [[strategy]]
/// type = "fng"
/// whitelist = ["BITCOIN"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "rsi", "sma" or "fng".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Overrides the derived name (`rsi30`, `sma200`, `fng`).
    #[serde(default)]
    pub name: Option<String>,
    /// Symbols this strategy may be bound to. Empty allows all.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Type-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read strategy config at '{path}': {e}")))?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("strategy config at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("parse strategy config: {e}")))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_parses() {
        let cfg = StrategyFileConfig::builtin().unwrap();
        assert_eq!(cfg.strategies.len(), 7);
        let fng = cfg.strategies.iter().find(|s| s.strategy_type == "fng").unwrap();
        assert_eq!(fng.whitelist, vec!["BITCOIN".to_string()]);
    }

    #[test]
    fn missing_params_default_to_empty() {
        let cfg = StrategyFileConfig::from_toml("[[strategy]]\ntype = \"fng\"\n").unwrap();
        assert!(cfg.strategies[0].params.is_empty());
        assert!(cfg.strategies[0].name.is_none());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = StrategyFileConfig::from_toml("[[strategy]]\nname = 3\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = StrategyFileConfig::load("/nonexistent/strategies.toml").unwrap_err();
        assert!(err.to_string().contains("read strategy config"));
    }
}
