pub mod rsi;
pub mod sma;

pub use rsi::RsiIndicator;
pub use sma::sma;
