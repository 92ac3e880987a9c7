pub mod timeframe;

pub use timeframe::Timeframe;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Per-indicator signal
///
/// Trend indicators emit Buy/Sell/Neutral, oscillators emit
/// Overbought/Oversold/Neutral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Overbought,
    Oversold,
    Neutral,
}

/// Side a signal votes for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaning {
    Buy,
    Sell,
}

impl Signal {
    /// Overbought leans to Sell, Oversold leans to Buy, Neutral abstains
    pub fn leaning(self) -> Option<Leaning> {
        match self {
            Signal::Buy | Signal::Oversold => Some(Leaning::Buy),
            Signal::Sell | Signal::Overbought => Some(Leaning::Sell),
            Signal::Neutral => None,
        }
    }
}

/// Output of one indicator on one timeframe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorResult {
    pub indicator_name: String,
    pub signal: Signal,
    pub numeric_value: Option<f64>,
}

impl IndicatorResult {
    pub fn new(indicator_name: &str, signal: Signal, numeric_value: Option<f64>) -> Self {
        Self {
            indicator_name: indicator_name.to_string(),
            signal,
            numeric_value,
        }
    }

    pub fn neutral(indicator_name: &str) -> Self {
        Self::new(indicator_name, Signal::Neutral, None)
    }
}

/// All indicator results computed for a single timeframe
///
/// Keyed by indicator name. A `BTreeMap` keeps iteration order fixed so the
/// weighted vote sums in the same order on every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeframeBundle {
    pub timeframe: Timeframe,
    pub results: BTreeMap<String, IndicatorResult>,
}

impl TimeframeBundle {
    pub fn new(timeframe: Timeframe, results: Vec<IndicatorResult>) -> Self {
        let results = results
            .into_iter()
            .map(|r| (r.indicator_name.clone(), r))
            .collect();
        Self { timeframe, results }
    }

    pub fn get(&self, indicator_name: &str) -> Option<&IndicatorResult> {
        self.results.get(indicator_name)
    }

    pub fn signal(&self, indicator_name: &str) -> Option<Signal> {
        self.get(indicator_name).map(|r| r.signal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorResult> {
        self.results.values()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Aggregate trading action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Result of the weighted vote across timeframes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub action: Action,
    /// Vote agreement in percent (0-100)
    pub confidence: f64,
    pub buy_weight: f64,
    pub sell_weight: f64,
}

impl Recommendation {
    /// No informative signal at all
    pub fn hold() -> Self {
        Self {
            action: Action::Hold,
            confidence: 0.0,
            buy_weight: 0.0,
            sell_weight: 0.0,
        }
    }
}

/// Intended holding duration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Horizon {
    Short,
    Long,
}

/// Concrete execution parameters for a recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeParameters {
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub horizon: Horizon,
    /// Estimated success probability in percent; 0 when no trade is proposed
    pub success_probability: f64,
}

/// Everything one analysis run hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub per_timeframe: Vec<TimeframeBundle>,
    pub recommendation: Recommendation,
    pub trade_parameters: TradeParameters,
}

impl AnalysisReport {
    /// Timeframes that produced a bundle in this run
    pub fn participating_timeframes(&self) -> Vec<Timeframe> {
        self.per_timeframe.iter().map(|b| b.timeframe).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_leaning() {
        assert_eq!(Signal::Buy.leaning(), Some(Leaning::Buy));
        assert_eq!(Signal::Oversold.leaning(), Some(Leaning::Buy));
        assert_eq!(Signal::Sell.leaning(), Some(Leaning::Sell));
        assert_eq!(Signal::Overbought.leaning(), Some(Leaning::Sell));
        assert_eq!(Signal::Neutral.leaning(), None);
    }

    #[test]
    fn test_bundle_lookup() {
        let bundle = TimeframeBundle::new(
            Timeframe::H1,
            vec![
                IndicatorResult::new("ema", Signal::Buy, Some(1.5)),
                IndicatorResult::neutral("rsi"),
            ],
        );

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.signal("ema"), Some(Signal::Buy));
        assert_eq!(bundle.signal("rsi"), Some(Signal::Neutral));
        assert_eq!(bundle.signal("macd"), None);
        assert_eq!(bundle.get("ema").unwrap().numeric_value, Some(1.5));
    }

    #[test]
    fn test_hold_recommendation() {
        let rec = Recommendation::hold();
        assert_eq!(rec.action, Action::Hold);
        assert_eq!(rec.confidence, 0.0);
    }
}
