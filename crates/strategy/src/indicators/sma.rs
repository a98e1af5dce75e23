/// Simple moving average over the most recent `length` prices.
///
/// Returns `None` when fewer than `length` prices are available.
pub fn sma(prices: &[f64], length: usize) -> Option<f64> {
    if length == 0 || prices.len() < length {
        return None;
    }
    let recent = &prices[prices.len() - length..];
    Some(recent.iter().sum::<f64>() / length as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_latest_window() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&prices, 2), Some(4.5));
        assert_eq!(sma(&prices, 5), Some(3.0));
    }

    #[test]
    fn sma_needs_full_window() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[1.0], 0), None);
    }
}
