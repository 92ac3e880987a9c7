use serde::{Deserialize, Serialize};

use super::round2;
use crate::error::{AdvisorError, Result};
use super::runner::TimeframeAnalysis;
use crate::indicators::{MACD, RSI, SUPERTREND};
use crate::models::{Action, Horizon, Recommendation, Signal, Timeframe, TradeParameters};

/// ATR multiples and success-probability model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub take_profit_atr: f64,
    pub stop_loss_atr: f64,
    /// Used instead when Supertrend agrees with the action
    pub trend_take_profit_atr: f64,
    pub trend_stop_loss_atr: f64,
    pub base_probability: f64,
    pub supertrend_bonus: f64,
    pub rsi_adjustment: f64,
    pub macd_adjustment: f64,
    pub min_probability: f64,
    pub max_probability: f64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            take_profit_atr: 1.5,
            stop_loss_atr: 1.0,
            trend_take_profit_atr: 2.0,
            trend_stop_loss_atr: 0.8,
            base_probability: 0.70,
            supertrend_bonus: 0.10,
            rsi_adjustment: 0.05,
            macd_adjustment: 0.05,
            min_probability: 0.50,
            max_probability: 0.95,
        }
    }
}

impl TradeConfig {
    /// Multiples and adjustments must be finite and non-negative, and
    /// `0 <= min_probability <= max_probability <= 1`
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("take_profit_atr", self.take_profit_atr),
            ("stop_loss_atr", self.stop_loss_atr),
            ("trend_take_profit_atr", self.trend_take_profit_atr),
            ("trend_stop_loss_atr", self.trend_stop_loss_atr),
            ("base_probability", self.base_probability),
            ("supertrend_bonus", self.supertrend_bonus),
            ("rsi_adjustment", self.rsi_adjustment),
            ("macd_adjustment", self.macd_adjustment),
            ("min_probability", self.min_probability),
            ("max_probability", self.max_probability),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(AdvisorError::Config(format!(
                "trade.{} must be finite and non-negative, got {}",
                name, value
            )));
        }

        if self.min_probability > self.max_probability || self.max_probability > 1.0 {
            return Err(AdvisorError::Config(format!(
                "trade probability bounds must satisfy 0 <= min ({}) <= max ({}) <= 1",
                self.min_probability, self.max_probability
            )));
        }
        Ok(())
    }
}

/// Turns a recommendation into entry, exits and a success estimate
#[derive(Debug, Clone, Default)]
pub struct TradeParameterCalculator {
    config: TradeConfig,
}

impl TradeParameterCalculator {
    pub fn new(config: TradeConfig) -> Self {
        Self { config }
    }

    /// Derive trade parameters from the primary timeframe
    ///
    /// `participating` lists every timeframe that produced a bundle and
    /// decides the horizon. Without a primary timeframe the result is an
    /// all-zero proposal.
    pub fn calculate(
        &self,
        recommendation: &Recommendation,
        primary: Option<&TimeframeAnalysis>,
        participating: &[Timeframe],
    ) -> TradeParameters {
        let horizon = if participating.iter().any(|tf| tf.is_long_horizon()) {
            Horizon::Long
        } else {
            Horizon::Short
        };

        let Some(primary) = primary else {
            return TradeParameters {
                entry_price: 0.0,
                take_profit: 0.0,
                stop_loss: 0.0,
                horizon,
                success_probability: 0.0,
            };
        };

        let entry = primary.latest.close;
        let atr = if primary.atr > 0.0 {
            primary.atr
        } else {
            primary.latest.high - primary.latest.low
        };

        let signal_of = |name: &str| primary.bundle.signal(name).unwrap_or(Signal::Neutral);
        let supertrend = signal_of(SUPERTREND);
        let rsi = signal_of(RSI);
        let macd = signal_of(MACD);

        let cfg = &self.config;
        let (take_profit, stop_loss, probability) = match recommendation.action {
            Action::Buy => {
                let trend = supertrend == Signal::Buy;
                let (tp_mult, sl_mult) = self.multipliers(trend);
                let probability = self.probability(trend, rsi, macd, Signal::Oversold, Signal::Buy);
                (entry + tp_mult * atr, entry - sl_mult * atr, probability)
            }
            Action::Sell => {
                let trend = supertrend == Signal::Sell;
                let (tp_mult, sl_mult) = self.multipliers(trend);
                let probability =
                    self.probability(trend, rsi, macd, Signal::Overbought, Signal::Sell);
                (entry - tp_mult * atr, entry + sl_mult * atr, probability)
            }
            Action::Hold => (entry, entry, 0.0),
        };

        tracing::debug!(
            action = ?recommendation.action,
            entry,
            atr,
            take_profit,
            stop_loss,
            base_probability = cfg.base_probability,
            "Trade parameters derived"
        );

        TradeParameters {
            entry_price: round2(entry),
            take_profit: round2(take_profit),
            stop_loss: round2(stop_loss),
            horizon,
            success_probability: round2(probability * 100.0),
        }
    }

    fn multipliers(&self, trend_agrees: bool) -> (f64, f64) {
        if trend_agrees {
            (self.config.trend_take_profit_atr, self.config.trend_stop_loss_atr)
        } else {
            (self.config.take_profit_atr, self.config.stop_loss_atr)
        }
    }

    /// `favourable_rsi` is the oscillator reading that supports the action,
    /// `agreeing_macd` the MACD signal that matches it
    fn probability(
        &self,
        trend_agrees: bool,
        rsi: Signal,
        macd: Signal,
        favourable_rsi: Signal,
        agreeing_macd: Signal,
    ) -> f64 {
        let cfg = &self.config;
        let mut probability = cfg.base_probability;

        if trend_agrees {
            probability += cfg.supertrend_bonus;
        }

        match rsi {
            Signal::Neutral => {}
            s if s == favourable_rsi => probability += cfg.rsi_adjustment,
            Signal::Overbought | Signal::Oversold => probability -= cfg.rsi_adjustment,
            _ => {}
        }

        match macd {
            Signal::Neutral => {}
            s if s == agreeing_macd => probability += cfg.macd_adjustment,
            _ => probability -= cfg.macd_adjustment,
        }

        // f64::clamp panics on inverted or NaN bounds
        probability.max(cfg.min_probability).min(cfg.max_probability)
    }
}
