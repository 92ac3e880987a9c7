// Direction prediction
// The "ai" vote: a per-timeframe model predicting the next candle's direction

pub mod model;
pub mod store;

pub use model::ReturnModel;
pub use store::{ModelStore, TrainingStatus};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Candle, Signal, Timeframe};

/// Indicator name the prediction is voted under
pub const AI_INDICATOR: &str = "ai";

/// Predicted direction of the next candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn to_signal(self) -> Signal {
        match self {
            Direction::Up => Signal::Buy,
            Direction::Down => Signal::Sell,
            Direction::Neutral => Signal::Neutral,
        }
    }
}

/// Predicts the next-candle direction for a timeframe
///
/// Called from timeframe tasks concurrently, so implementations are read-only
/// while a run is in flight.
pub trait DirectionPredictor: Send + Sync {
    fn predict_direction(&self, timeframe: Timeframe, candles: &[Candle]) -> Result<Direction>;
}

/// Predictor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Most recent candles of each training series used for fitting
    pub lookback: usize,
    /// Predicted returns within ±band are Neutral
    pub neutral_band: f64,
    /// Candles fetched per symbol and timeframe when training
    pub training_limit: usize,
    pub retrain_interval_days: i64,
    /// Symbols pooled into each timeframe's training set
    pub training_symbols: Vec<String>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            lookback: 500,
            neutral_band: 0.0005,
            training_limit: 1000,
            retrain_interval_days: 7,
            training_symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_votes() {
        assert_eq!(Direction::Up.to_signal(), Signal::Buy);
        assert_eq!(Direction::Down.to_signal(), Signal::Sell);
        assert_eq!(Direction::Neutral.to_signal(), Signal::Neutral);
    }

    #[test]
    fn test_direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
    }
}
