use super::RSI;
use crate::models::{Candle, IndicatorResult, Signal};

/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions. Gains and losses are averaged over
/// the last `period` close-to-close changes.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// A window without losses reads exactly 100; a window without any price
/// movement reads 50.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();

    // Calculate price changes
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    // Calculate average gain and loss
    let avg_gain: f64 = gains.iter().rev().take(period).sum::<f64>() / period as f64;
    let avg_loss: f64 = losses.iter().rev().take(period).sum::<f64>() / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - (100.0 / (1.0 + rs));

    Some(rsi)
}

/// RSI oscillator signal
///
/// Thresholds are strict: exactly `overbought` or `oversold` is Neutral.
pub fn rsi_signal(candles: &[Candle], period: usize, overbought: f64, oversold: f64) -> IndicatorResult {
    let prices: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let Some(rsi) = calculate_rsi(&prices, period) else {
        tracing::debug!(candles = candles.len(), required = period + 1, "RSI: insufficient history");
        return IndicatorResult::neutral(RSI);
    };

    let signal = if rsi > overbought {
        Signal::Overbought
    } else if rsi < oversold {
        Signal::Oversold
    } else {
        Signal::Neutral
    };

    IndicatorResult::new(RSI, signal, Some(rsi))
}
