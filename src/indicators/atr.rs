/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The first bar has no previous close, so its true range is High - Low.
/// ATR here is the plain rolling mean of the last `period` true ranges.

use super::ATR;
use crate::models::{Candle, IndicatorResult, Signal};

/// True range for every bar
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let range = candle.high - candle.low;
            if i == 0 {
                return range;
            }
            let prev_close = candles[i - 1].close;
            range
                .max((candle.high - prev_close).abs())
                .max((candle.low - prev_close).abs())
        })
        .collect()
}

/// Rolling-mean ATR series
///
/// Element `k` is the ATR at candle index `k + period - 1`; empty when there
/// are fewer than `period` candles.
pub fn calculate_atr_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    true_ranges(candles)
        .windows(period)
        .map(|window| window.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Calculate ATR at the last candle
///
/// Returns None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    calculate_atr_series(candles, period).last().copied()
}

/// ATR as a diagnostic bundle entry
///
/// Never votes. Insufficient history reports 0.0.
pub fn atr_result(candles: &[Candle], period: usize) -> IndicatorResult {
    let atr = calculate_atr(candles, period).unwrap_or_else(|| {
        tracing::debug!(candles = candles.len(), required = period, "ATR: insufficient history");
        0.0
    });

    IndicatorResult::new(ATR, Signal::Neutral, Some(atr))
}
