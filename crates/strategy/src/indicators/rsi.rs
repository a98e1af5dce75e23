use tracing::warn;

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Seeds the averages over the first `period` changes, then smooths over the rest.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    ///
    /// With fewer than `period + 1` values the seed covers whatever changes
    /// exist (still divided by `period`) and a warning is logged.
    /// Zero average loss yields 100, zero average gain yields 0, and a flat
    /// series yields 50.
    pub fn compute(&self, closes: &[f64]) -> f64 {
        if closes.len() < self.period + 1 {
            warn!(
                have = closes.len(),
                need = self.period + 1,
                "RSI computed over too few prices"
            );
        }

        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let seed = changes.len().min(self.period);
        let initial = &changes[..seed];
        let period = self.period as f64;

        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / period;
        let mut avg_loss = initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>() / period;

        // Wilder smoothing over remaining changes
        for &change in &changes[seed..] {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (period - 1.0) + gain) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss) / period;
        }

        if avg_loss == 0.0 {
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }

        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}
