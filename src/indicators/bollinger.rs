use super::moving_average::calculate_sma;
use super::BOLLINGER;
use crate::models::{Candle, IndicatorResult, Signal};

/// Bollinger Bands at the last bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// SMA and sample standard deviation over the last `period` prices
///
/// Needs at least two prices in the window.
pub fn calculate_bollinger(prices: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    if period < 2 || prices.len() < period {
        return None;
    }

    let middle = calculate_sma(prices, period)?;
    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / (period as f64 - 1.0);
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        middle,
        upper: middle + multiplier * std_dev,
        lower: middle - multiplier * std_dev,
    })
}

/// Mean-reversion Bollinger signal
///
/// A close above the upper band is treated as overextended (Sell) and a
/// close below the lower band as oversold (Buy). This is the opposite of a
/// breakout-following reading and deliberately disagrees with the trend
/// indicators. `numeric_value` is %B, the close's position inside the bands.
pub fn bollinger_signal(candles: &[Candle], period: usize, multiplier: f64) -> IndicatorResult {
    let prices: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let (Some(bands), Some(&close)) = (calculate_bollinger(&prices, period, multiplier), prices.last())
    else {
        tracing::debug!(candles = candles.len(), required = period, "Bollinger: insufficient history");
        return IndicatorResult::neutral(BOLLINGER);
    };

    let signal = if close > bands.upper {
        Signal::Sell
    } else if close < bands.lower {
        Signal::Buy
    } else {
        Signal::Neutral
    };

    let width = bands.upper - bands.lower;
    let percent_b = if width > 0.0 {
        (close - bands.lower) / width
    } else {
        0.5
    };

    IndicatorResult::new(BOLLINGER, signal, Some(percent_b))
}
