// Technical indicators module
// Implements Supertrend, EMA, RSI, MACD, ATR and Bollinger Bands as pure
// functions over a candle series

pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod supertrend;

pub use atr::{atr_result, calculate_atr, calculate_atr_series, true_ranges};
pub use bollinger::{bollinger_signal, calculate_bollinger, BollingerBands};
pub use macd::{calculate_macd, macd_signal, MacdValue};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma, ema_signal};
pub use rsi::{calculate_rsi, rsi_signal};
pub use supertrend::{
    calculate_supertrend, supertrend_directions, supertrend_signal, SupertrendState,
    TrendDirection,
};

use serde::{Deserialize, Serialize};

use crate::models::{Candle, IndicatorResult};

pub const SUPERTREND: &str = "supertrend";
pub const EMA: &str = "ema";
pub const RSI: &str = "rsi";
pub const MACD: &str = "macd";
pub const ATR: &str = "atr";
pub const BOLLINGER: &str = "bollinger";

/// Technical indicators the engine knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Supertrend,
    Ema,
    Rsi,
    Macd,
    Atr,
    Bollinger,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 6] = [
        IndicatorKind::Supertrend,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Atr,
        IndicatorKind::Bollinger,
    ];

    /// Name used in bundles and in the indicator weight map
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supertrend => SUPERTREND,
            Self::Ema => EMA,
            Self::Rsi => RSI,
            Self::Macd => MACD,
            Self::Atr => ATR,
            Self::Bollinger => BOLLINGER,
        }
    }
}

/// Indicator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub enabled: Vec<IndicatorKind>,
    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,
    pub ema_short_period: usize,
    pub ema_long_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub atr_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            enabled: IndicatorKind::ALL.to_vec(),
            supertrend_period: 10,
            supertrend_multiplier: 3.0,
            ema_short_period: 9,
            ema_long_period: 21,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            atr_period: 14,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
        }
    }
}

impl IndicatorConfig {
    /// Run one indicator with the configured parameters
    pub fn compute(&self, kind: IndicatorKind, candles: &[Candle]) -> IndicatorResult {
        match kind {
            IndicatorKind::Supertrend => {
                supertrend_signal(candles, self.supertrend_period, self.supertrend_multiplier)
            }
            IndicatorKind::Ema => ema_signal(candles, self.ema_short_period, self.ema_long_period),
            IndicatorKind::Rsi => {
                rsi_signal(candles, self.rsi_period, self.rsi_overbought, self.rsi_oversold)
            }
            IndicatorKind::Macd => macd_signal(
                candles,
                self.macd_fast_period,
                self.macd_slow_period,
                self.macd_signal_period,
            ),
            IndicatorKind::Atr => atr_result(candles, self.atr_period),
            IndicatorKind::Bollinger => {
                bollinger_signal(candles, self.bollinger_period, self.bollinger_multiplier)
            }
        }
    }

    /// Longest look-back any enabled indicator needs
    pub fn max_lookback(&self) -> usize {
        self.enabled
            .iter()
            .map(|kind| match kind {
                IndicatorKind::Supertrend => self.supertrend_period,
                IndicatorKind::Ema => self.ema_long_period.max(self.ema_short_period),
                IndicatorKind::Rsi => self.rsi_period + 1,
                IndicatorKind::Macd => self.macd_slow_period,
                IndicatorKind::Atr => self.atr_period,
                IndicatorKind::Bollinger => self.bollinger_period,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Relative float comparison for crossover ties
pub(crate) fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}


#[cfg(test)]
mod tests {
    use super::test_support::candles_from_closes;
    use super::*;
    use crate::models::Signal;

    #[test]
    fn test_every_indicator_neutral_on_short_series() {
        let config = IndicatorConfig::default();
        let candles = candles_from_closes(&[100.0, 101.0, 102.0]);

        for kind in IndicatorKind::ALL {
            let result = config.compute(kind, &candles);
            assert_eq!(result.signal, Signal::Neutral, "{} should be neutral", kind.name());
            assert_eq!(result.indicator_name, kind.name());
        }
    }

    #[test]
    fn test_every_indicator_neutral_on_empty_series() {
        let config = IndicatorConfig::default();
        for kind in IndicatorKind::ALL {
            assert_eq!(config.compute(kind, &[]).signal, Signal::Neutral);
        }
    }

    #[test]
    fn test_max_lookback_follows_enabled_set() {
        let mut config = IndicatorConfig::default();
        assert_eq!(config.max_lookback(), 26);

        config.enabled = vec![IndicatorKind::Rsi];
        assert_eq!(config.max_lookback(), 15);

        config.enabled.clear();
        assert_eq!(config.max_lookback(), 0);
    }

    #[test]
    fn test_nearly_equal() {
        assert!(nearly_equal(100.0, 100.0));
        assert!(nearly_equal(100.0, 100.0 + 1e-10));
        assert!(!nearly_equal(100.0, 100.001));
        assert!(nearly_equal(0.0, 1e-12));
    }
}
