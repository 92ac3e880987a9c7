use super::moving_average::calculate_ema_series;
use super::{nearly_equal, MACD};
use crate::models::{Candle, IndicatorResult, Signal};

/// MACD line, signal line and histogram at the last bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD = EMA(fast) - EMA(slow), signal = EMA(MACD, signal_period)
///
/// Returns None with fewer than `slow_period` prices.
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if fast_period == 0 || signal_period == 0 || slow_period == 0 || prices.len() < slow_period {
        return None;
    }

    let fast = calculate_ema_series(prices, fast_period);
    let slow = calculate_ema_series(prices, slow_period);

    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal_line = calculate_ema_series(&macd_line, signal_period);

    let macd = *macd_line.last()?;
    let signal = *signal_line.last()?;

    Some(MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    })
}

/// MACD / signal-line crossover
///
/// Buy when MACD is above its signal line, Sell when below, Neutral when
/// they coincide or history is too short.
pub fn macd_signal(
    candles: &[Candle],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> IndicatorResult {
    let prices: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let Some(value) = calculate_macd(&prices, fast_period, slow_period, signal_period) else {
        tracing::debug!(candles = candles.len(), required = slow_period, "MACD: insufficient history");
        return IndicatorResult::neutral(MACD);
    };

    let signal = if nearly_equal(value.macd, value.signal) {
        Signal::Neutral
    } else if value.macd > value.signal {
        Signal::Buy
    } else {
        Signal::Sell
    };

    IndicatorResult::new(MACD, signal, Some(value.histogram))
}
