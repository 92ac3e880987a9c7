use super::{nearly_equal, EMA};
use crate::models::{Candle, IndicatorResult, Signal};

/// Calculate Simple Moving Average (SMA) over the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Full EMA series, one value per input
///
/// Smoothing factor is `2 / (period + 1)` and the recursion is seeded with
/// the first value, so the series is defined from the first bar on.
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    let mut series = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    series.push(ema);
    for price in &prices[1..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    series
}

/// Calculate Exponential Moving Average (EMA) at the last bar
///
/// Returns None until at least `period` values are available.
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    calculate_ema_series(prices, period).last().copied()
}

/// Short/long EMA crossover
///
/// Buy when the short EMA is above the long EMA at the last bar, Sell when
/// below. Neutral when history is shorter than `long_period` or the two
/// averages coincide (flat market).
pub fn ema_signal(candles: &[Candle], short_period: usize, long_period: usize) -> IndicatorResult {
    let prices: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let (Some(short), Some(long)) = (
        calculate_ema(&prices, short_period),
        calculate_ema(&prices, long_period),
    ) else {
        tracing::debug!(
            candles = candles.len(),
            required = long_period.max(short_period),
            "EMA: insufficient history"
        );
        return IndicatorResult::neutral(EMA);
    };

    let spread = short - long;
    let signal = if nearly_equal(short, long) {
        Signal::Neutral
    } else if spread > 0.0 {
        Signal::Buy
    } else {
        Signal::Sell
    };

    IndicatorResult::new(EMA, signal, Some(spread))
}
