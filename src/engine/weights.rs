use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AdvisorError, Result};
use crate::indicators::IndicatorKind;
use crate::models::Timeframe;
use crate::predictor::AI_INDICATOR;

/// Validated vote weights
///
/// Weights are relative and never normalised. A timeframe or indicator
/// without an entry weighs 0 and cannot move the vote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightConfig {
    timeframes: BTreeMap<Timeframe, f64>,
    indicators: BTreeMap<String, f64>,
}

fn check_weight(key: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AdvisorError::InvalidWeight {
            key: key.to_string(),
            value,
        })
    }
}

fn duplicate_key(key: &str) -> AdvisorError {
    AdvisorError::Config(format!("weight for {} is given more than once", key))
}

impl WeightConfig {
    /// Build from timeframe and indicator weights, rejecting negative or
    /// non-finite values
    ///
    /// A key given twice (for instance "1h" and "60" both naming one hour)
    /// is a configuration error rather than a silent overwrite.
    pub fn new<T, I, S>(timeframes: T, indicators: I) -> Result<Self>
    where
        T: IntoIterator<Item = (Timeframe, f64)>,
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut timeframe_weights = BTreeMap::new();
        for (tf, w) in timeframes {
            let w = check_weight(tf.as_str(), w)?;
            if timeframe_weights.insert(tf, w).is_some() {
                return Err(duplicate_key(tf.as_str()));
            }
        }

        let mut indicator_weights = BTreeMap::new();
        for (name, w) in indicators {
            let name: String = name.into();
            let w = check_weight(&name, w)?;
            if indicator_weights.insert(name.clone(), w).is_some() {
                return Err(duplicate_key(&name));
            }
        }

        Ok(Self {
            timeframes: timeframe_weights,
            indicators: indicator_weights,
        })
    }

    /// Weight 1.0 for every timeframe and for every known indicator plus "ai"
    pub fn uniform(timeframes: &[Timeframe]) -> Self {
        let indicators = IndicatorKind::ALL
            .iter()
            .map(|k| k.name())
            .chain(std::iter::once(AI_INDICATOR))
            .map(|name| (name.to_string(), 1.0))
            .collect();

        Self {
            timeframes: timeframes.iter().map(|tf| (*tf, 1.0)).collect(),
            indicators,
        }
    }

    pub fn timeframe_weight(&self, timeframe: Timeframe) -> f64 {
        self.timeframes.get(&timeframe).copied().unwrap_or(0.0)
    }

    pub fn indicator_weight(&self, name: &str) -> f64 {
        self.indicators.get(name).copied().unwrap_or(0.0)
    }

    pub fn has_timeframe(&self, timeframe: Timeframe) -> bool {
        self.timeframes.contains_key(&timeframe)
    }

    pub fn has_indicator(&self, name: &str) -> bool {
        self.indicators.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_weight_rejected() {
        let result = WeightConfig::new([(Timeframe::H1, -1.0)], [("ema", 1.0)]);

        match result {
            Err(AdvisorError::InvalidWeight { key, value }) => {
                assert_eq!(key, "1h");
                assert_eq!(value, -1.0);
            }
            other => panic!("expected InvalidWeight, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_indicator_weight_rejected() {
        let result = WeightConfig::new([(Timeframe::H1, 1.0)], [("rsi", f64::NAN)]);
        assert!(matches!(result, Err(AdvisorError::InvalidWeight { .. })));
    }

    #[test]
    fn test_missing_weights_default_to_zero() {
        let weights = WeightConfig::new([(Timeframe::H4, 2.0)], [("macd", 0.5)]).unwrap();

        assert_eq!(weights.timeframe_weight(Timeframe::H4), 2.0);
        assert_eq!(weights.timeframe_weight(Timeframe::D1), 0.0);
        assert_eq!(weights.indicator_weight("macd"), 0.5);
        assert_eq!(weights.indicator_weight("supertrend"), 0.0);
    }

    #[test]
    fn test_zero_weight_allowed() {
        let weights = WeightConfig::new([(Timeframe::H1, 0.0)], [("ema", 0.0)]).unwrap();
        assert!(weights.has_timeframe(Timeframe::H1));
        assert_eq!(weights.timeframe_weight(Timeframe::H1), 0.0);
    }

    #[test]
    fn test_duplicate_timeframe_rejected() {
        let result = WeightConfig::new([(Timeframe::H1, 1.0), (Timeframe::H1, 5.0)], [("ema", 1.0)]);

        match result {
            Err(AdvisorError::Config(msg)) => assert!(msg.contains("1h"), "{}", msg),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_indicator_rejected() {
        let result = WeightConfig::new([(Timeframe::H1, 1.0)], [("rsi", 1.0), ("rsi", 2.0)]);
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_uniform_covers_ai() {
        let weights = WeightConfig::uniform(&[Timeframe::H1]);
        assert_eq!(weights.indicator_weight("ai"), 1.0);
        assert_eq!(weights.indicator_weight("bollinger"), 1.0);
        assert_eq!(weights.timeframe_weight(Timeframe::H1), 1.0);
    }
}
