/// Supertrend indicator
///
/// Trend-following direction derived from ATR volatility bands around the
/// bar midpoint `(high + low) / 2`:
/// - basic upper band = midpoint + multiplier * ATR
/// - basic lower band = midpoint - multiplier * ATR
///
/// The tracked upper band only ratchets down and the tracked lower band only
/// ratchets up, until price closes through them. A close above the previous
/// bar's upper band turns the trend bullish, a close below the previous
/// bar's lower band turns it bearish; anything else carries the previous
/// state forward. Direction stays undefined until the first crossing.

use serde::{Deserialize, Serialize};

use super::atr::calculate_atr_series;
use super::SUPERTREND;
use crate::models::{Candle, IndicatorResult, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

/// State carried from one bar to the next
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendState {
    pub direction: Option<TrendDirection>,
    pub upper_band: f64,
    pub lower_band: f64,
}

impl SupertrendState {
    /// Band the trend is currently riding: lower when bullish, upper when bearish
    pub fn active_band(&self) -> Option<f64> {
        match self.direction {
            Some(TrendDirection::Bullish) => Some(self.lower_band),
            Some(TrendDirection::Bearish) => Some(self.upper_band),
            None => None,
        }
    }
}

/// Advance the Supertrend state by one bar
///
/// `prev` is None on the first bar with a defined ATR, which only seeds the
/// bands.
pub fn step(
    prev: Option<(SupertrendState, f64)>,
    candle: &Candle,
    atr: f64,
    multiplier: f64,
) -> SupertrendState {
    let midpoint = (candle.high + candle.low) / 2.0;
    let basic_upper = midpoint + multiplier * atr;
    let basic_lower = midpoint - multiplier * atr;

    let Some((prev_state, prev_close)) = prev else {
        return SupertrendState {
            direction: None,
            upper_band: basic_upper,
            lower_band: basic_lower,
        };
    };

    let upper_band = if basic_upper < prev_state.upper_band || prev_close > prev_state.upper_band {
        basic_upper
    } else {
        prev_state.upper_band
    };
    let lower_band = if basic_lower > prev_state.lower_band || prev_close < prev_state.lower_band {
        basic_lower
    } else {
        prev_state.lower_band
    };

    let direction = if candle.close > prev_state.upper_band {
        Some(TrendDirection::Bullish)
    } else if candle.close < prev_state.lower_band {
        Some(TrendDirection::Bearish)
    } else {
        prev_state.direction
    };

    SupertrendState {
        direction,
        upper_band,
        lower_band,
    }
}

/// Supertrend state for every bar, aligned with `candles`
///
/// Bars before the ATR window is filled map to None.
pub fn calculate_supertrend(
    candles: &[Candle],
    period: usize,
    multiplier: f64,
) -> Vec<Option<SupertrendState>> {
    let atr_series = calculate_atr_series(candles, period);
    if atr_series.is_empty() {
        return vec![None; candles.len()];
    }

    let warmup = period - 1;
    let mut states = vec![None; warmup];

    let tracked = candles[warmup..].iter().zip(&atr_series).fold(
        (None::<(SupertrendState, f64)>, Vec::with_capacity(atr_series.len())),
        |(prev, mut acc), (candle, &atr)| {
            let state = step(prev, candle, atr, multiplier);
            acc.push(Some(state));
            (Some((state, candle.close)), acc)
        },
    );

    states.extend(tracked.1);
    states
}

/// Direction sequence, aligned with `candles`
pub fn supertrend_directions(
    candles: &[Candle],
    period: usize,
    multiplier: f64,
) -> Vec<Option<TrendDirection>> {
    calculate_supertrend(candles, period, multiplier)
        .into_iter()
        .map(|state| state.and_then(|s| s.direction))
        .collect()
}

/// Supertrend signal at the last bar: Buy when bullish, Sell when bearish
pub fn supertrend_signal(candles: &[Candle], period: usize, multiplier: f64) -> IndicatorResult {
    let last = calculate_supertrend(candles, period, multiplier)
        .last()
        .copied()
        .flatten();

    let Some(state) = last else {
        tracing::debug!(candles = candles.len(), required = period, "Supertrend: insufficient history");
        return IndicatorResult::neutral(SUPERTREND);
    };

    let signal = match state.direction {
        Some(TrendDirection::Bullish) => Signal::Buy,
        Some(TrendDirection::Bearish) => Signal::Sell,
        None => Signal::Neutral,
    };

    IndicatorResult::new(SUPERTREND, signal, state.active_band())
}
