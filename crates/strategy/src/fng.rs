use std::time::Duration;

use common::{Action, Error, Result, Strength, Verdict};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

pub const FNG_NAME: &str = "fng";

/// Crypto Fear & Greed index. Ignores the price series and calls the index API.
///
/// Fulfilled only when the classification maps to Buy or Sell. Any transport
/// or decode failure degrades to an unfulfilled verdict carrying the error.
#[derive(Debug, Clone)]
pub struct FearGreedIndex {
    name: String,
    url: String,
    http: Client,
    pub(crate) whitelist: Vec<String>,
}

impl FearGreedIndex {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("build fng http client: {e}")))?;

        Ok(Self {
            name: FNG_NAME.to_string(),
            url: url.into(),
            http,
            whitelist: vec!["BITCOIN".to_string()],
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn evaluate(&self) -> Verdict {
        match self.latest().await {
            Ok(entry) => self.verdict_for(&entry),
            Err(e) => {
                warn!(strategy = %self.name, error = %e, "Fear & Greed lookup failed");
                Verdict::new(self.name.as_str(), false, e.to_string())
            }
        }
    }

    async fn latest(&self) -> Result<FngEntry> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Provider {
                provider: "fng",
                message: format!("get fng api: {e}"),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Provider {
            provider: "fng",
            message: format!("read fng api resp body: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: "fng",
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: FngResponse = serde_json::from_str(&body).map_err(|e| Error::Decode {
            provider: "fng",
            message: e.to_string(),
        })?;

        debug!(entries = parsed.data.len(), "Fear & Greed response decoded");
        parsed.data.into_iter().next().ok_or_else(|| Error::Decode {
            provider: "fng",
            message: "expected data at least of length 1, got none".into(),
        })
    }

    fn verdict_for(&self, entry: &FngEntry) -> Verdict {
        let Some((strength, action)) = classify(&entry.value_classification) else {
            return Verdict::new(
                self.name.as_str(),
                false,
                format!("unexpected value classification: {}", entry.value_classification),
            );
        };

        let actionable = matches!(action, Action::Buy | Action::Sell);
        let message = format!(
            "{strength} {action}! {}({})",
            entry.value_classification, entry.value
        );
        Verdict::new(self.name.as_str(), actionable, message).with_strength(strength)
    }
}

/// Fixed lookup from index classification to (strength, action).
pub fn classify(classification: &str) -> Option<(Strength, Action)> {
    match classification {
        "Extreme Fear" => Some((Strength::VeryStrong, Action::Buy)),
        "Fear" => Some((Strength::Strong, Action::Buy)),
        "Neutral" => Some((Strength::Neutral, Action::Notify)),
        "Greed" => Some((Strength::Strong, Action::Sell)),
        "Extreme Greed" => Some((Strength::VeryStrong, Action::Sell)),
        _ => None,
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
}
