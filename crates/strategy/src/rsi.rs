use common::{Action, Strength, Verdict};

use crate::indicators::RsiIndicator;

pub const DEFAULT_PERIOD: usize = 14;
/// Absolute RSI points around `level` that still count as reaching it.
pub const DEFAULT_ZONE_TOLERANCE: f64 = 2.0;

/// Fires when RSI reaches `level`: at or above it for sells, at or below it
/// for buys, inside the tolerance band for notifications.
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    name: String,
    pub level: f64,
    pub strength: Strength,
    pub action: Action,
    pub tolerance: f64,
    pub(crate) whitelist: Vec<String>,
    indicator: RsiIndicator,
}

impl RsiStrategy {
    pub fn new(level: f64, strength: Strength, action: Action) -> Self {
        Self {
            name: format!("rsi{level:.0}"),
            level,
            strength,
            action,
            tolerance: DEFAULT_ZONE_TOLERANCE,
            whitelist: Vec::new(),
            indicator: RsiIndicator::new(DEFAULT_PERIOD),
        }
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.indicator = RsiIndicator::new(period);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, prices: &[f64]) -> Verdict {
        let rsi = self.indicator.compute(prices);
        let reached = self.reached_level(rsi);
        Verdict::new(self.name.as_str(), reached, self.message(rsi, reached)).with_strength(self.strength)
    }

    fn reached_level(&self, rsi: f64) -> bool {
        let upper = self.level + self.tolerance;
        let lower = self.level - self.tolerance;

        match self.action {
            Action::Sell => rsi >= lower,
            Action::Buy => rsi <= upper,
            Action::Notify => (lower..=upper).contains(&rsi),
        }
    }

    fn message(&self, rsi: f64, reached: bool) -> String {
        if !reached {
            return format!("RSI of {rsi:.2} not at {} levels", self.name);
        }

        match self.action {
            Action::Notify => format!("RSI of {rsi:.2} reached {} levels", self.name),
            _ => format!(
                "{} {}! RSI of {rsi:.2} in {} zone",
                self.strength, self.action, self.name
            ),
        }
    }
}
