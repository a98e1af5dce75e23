use std::collections::HashMap;
use std::time::Duration;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: i64,

    // HTTP surface
    pub api_port: u16,

    // Stock provider (RapidAPI)
    pub rapid_api: RapidApiConfig,

    // Crypto providers
    pub token_insight: ProviderCredentials,
    pub coin_api: ProviderCredentials,
    /// Crypto symbol → exchange shorthand, needed for weekly crypto data.
    pub crypto_shorthands: HashMap<String, String>,

    // Strategies
    pub strategy_config_path: String,
    pub fng_api_url: String,

    pub timeouts: Timeouts,
}

#[derive(Debug, Clone)]
pub struct RapidApiConfig {
    pub base_url: String,
    pub key: String,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub base_url: String,
    pub key: String,
}

/// Deadlines per class of operation.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub store_read: Duration,
    pub store_write: Duration,
    pub fetch: Duration,
    /// Whole refresh of one ticker (fetch + window write).
    pub refresh_ticker: Duration,
    /// Whole evaluation of one ticker (series read + all strategies).
    pub evaluate_ticker: Duration,
    pub sentiment: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store_read: Duration::from_secs(2),
            store_write: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            refresh_ticker: Duration::from_secs(45),
            evaluate_ticker: Duration::from_secs(10),
            sentiment: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    fn from_env() -> Self {
        let defaults = Timeouts::default();
        Self {
            store_read: secs_env("STORE_READ_TIMEOUT_SECS", defaults.store_read),
            store_write: secs_env("STORE_WRITE_TIMEOUT_SECS", defaults.store_write),
            fetch: secs_env("FETCH_TIMEOUT_SECS", defaults.fetch),
            refresh_ticker: secs_env("REFRESH_TICKER_TIMEOUT_SECS", defaults.refresh_ticker),
            evaluate_ticker: secs_env("EVALUATE_TIMEOUT_SECS", defaults.evaluate_ticker),
            sentiment: secs_env("SENTIMENT_TIMEOUT_SECS", defaults.sentiment),
        }
    }
}

pub const DEFAULT_FNG_API_URL: &str = "https://api.alternative.me/fng/";
const DEFAULT_CRYPTO_SHORTHANDS: &str = "BITCOIN:BTC,ETHEREUM:ETH";

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")
            .trim()
            .parse::<i64>()
            .unwrap_or_else(|_| panic!("TELEGRAM_CHAT_ID must be a numeric chat id"));

        let crypto_shorthands = parse_shorthands(
            &optional_env("CRYPTO_SHORTHANDS").unwrap_or_else(|| DEFAULT_CRYPTO_SHORTHANDS.to_string()),
        );

        Config {
            database_url: required_env("DATABASE_URL"),
            telegram_token: required_env("TELEGRAM_TOKEN"),
            telegram_chat_id,
            api_port: optional_env("API_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8181),
            rapid_api: RapidApiConfig {
                base_url: required_env("RAPID_API_BASE_URL"),
                key: required_env("RAPID_API_KEY"),
                host: required_env("RAPID_API_HOST"),
            },
            token_insight: ProviderCredentials {
                base_url: required_env("TI_BASE_URL"),
                key: required_env("TI_API_KEY"),
            },
            coin_api: ProviderCredentials {
                base_url: required_env("COINAPI_BASE_URL"),
                key: required_env("COINAPI_API_KEY"),
            },
            crypto_shorthands,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            fng_api_url: optional_env("FNG_API_URL")
                .unwrap_or_else(|| DEFAULT_FNG_API_URL.to_string()),
            timeouts: Timeouts::from_env(),
        }
    }
}

/// Parse `SYMBOL:SHORT,SYMBOL:SHORT` pairs. Malformed entries are skipped.
pub fn parse_shorthands(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (symbol, short) = pair.split_once(':')?;
            let (symbol, short) = (symbol.trim(), short.trim());
            if symbol.is_empty() || short.is_empty() {
                return None;
            }
            Some((symbol.to_uppercase(), short.to_uppercase()))
        })
        .collect()
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn secs_env(key: &str, default: Duration) -> Duration {
    optional_env(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
