use common::{Strength, Verdict};

use crate::indicators::sma;

/// Percentage around the average that counts as "at" it.
pub const DEFAULT_TOLERANCE_PCT: f64 = 10.0;

/// Fires when the latest price sits within ±tolerance% of the SMA.
#[derive(Debug, Clone)]
pub struct SmaStrategy {
    name: String,
    pub length: usize,
    pub strength: Strength,
    pub tolerance_pct: f64,
    pub(crate) whitelist: Vec<String>,
}

impl SmaStrategy {
    pub fn new(length: usize, strength: Strength) -> Self {
        Self {
            name: format!("sma{length}"),
            length,
            strength,
            tolerance_pct: DEFAULT_TOLERANCE_PCT,
            whitelist: Vec::new(),
        }
    }

    pub fn with_tolerance_pct(mut self, tolerance_pct: f64) -> Self {
        self.tolerance_pct = tolerance_pct;
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
        let (Some(average), Some(&latest)) = (sma(prices, self.length), prices.last()) else {
            return Verdict::new(self.name.as_str(), false, format!("lack {} data", self.length));
        };

        // Band width is absolute so a negative tolerance or price can't invert it.
        let width = (average * self.tolerance_pct / 100.0).abs();
        // Summation error of the mean is bounded by length ulps.
        let slack = f64::EPSILON * average.abs() * self.length as f64;
        let in_zone = (latest - average).abs() <= width + slack;

        let message = if in_zone {
            format!("{} zone! Price at {} levels({average:.2})", self.strength, self.name)
        } else {
            format!("Price not at {} levels({average:.2})", self.name)
        };

        Verdict::new(self.name.as_str(), in_zone, message).with_strength(self.strength)
    }
}
