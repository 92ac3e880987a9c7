use crate::indicators::{calculate_atr, IndicatorConfig};
use crate::models::{Candle, IndicatorResult, Timeframe, TimeframeBundle};
use crate::predictor::{DirectionPredictor, AI_INDICATOR};

/// Everything one timeframe contributes to a run
#[derive(Debug, Clone)]
pub struct TimeframeAnalysis {
    pub bundle: TimeframeBundle,
    pub latest: Candle,
    /// ATR over the configured period, 0.0 when history is too short
    pub atr: f64,
}

/// Computes the indicator bundle for a single timeframe
#[derive(Debug, Clone, Default)]
pub struct TimeframeRunner {
    config: IndicatorConfig,
}

impl TimeframeRunner {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Run every enabled indicator and the direction predictor
    ///
    /// Returns None only for an empty series. A failing predictor drops the
    /// "ai" entry and leaves the rest of the bundle intact.
    pub fn run<M>(&self, timeframe: Timeframe, candles: &[Candle], predictor: &M) -> Option<TimeframeAnalysis>
    where
        M: DirectionPredictor + ?Sized,
    {
        let latest = candles.last()?.clone();

        let mut results: Vec<IndicatorResult> = self
            .config
            .enabled
            .iter()
            .map(|&kind| self.config.compute(kind, candles))
            .collect();

        match predictor.predict_direction(timeframe, candles) {
            Ok(direction) => {
                results.push(IndicatorResult::new(AI_INDICATOR, direction.to_signal(), None));
            }
            Err(e) => {
                tracing::warn!(timeframe = %timeframe, error = %e, "Direction predictor failed, omitting ai vote");
            }
        }

        let atr = calculate_atr(candles, self.config.atr_period).unwrap_or(0.0);
        let bundle = TimeframeBundle::new(timeframe, results);

        tracing::debug!(
            timeframe = %timeframe,
            candles = candles.len(),
            indicators = bundle.len(),
            atr,
            "Timeframe bundle computed"
        );

        Some(TimeframeAnalysis {
            bundle,
            latest,
            atr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdvisorError, Result};
    use crate::indicators::test_support::candles_from_closes;
    use crate::indicators::IndicatorKind;
    use crate::models::Signal;
    use crate::predictor::Direction;

    struct Fixed(Direction);

    impl DirectionPredictor for Fixed {
        fn predict_direction(&self, _: Timeframe, _: &[Candle]) -> Result<Direction> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl DirectionPredictor for Broken {
        fn predict_direction(&self, timeframe: Timeframe, _: &[Candle]) -> Result<Direction> {
            Err(AdvisorError::ModelNotTrained(timeframe))
        }
    }

    fn rising(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        candles_from_closes(&closes)
    }

    #[test]
    fn test_bundle_contains_enabled_indicators_and_ai() {
        let runner = TimeframeRunner::default();
        let analysis = runner
            .run(Timeframe::H1, &rising(40), &Fixed(Direction::Up))
            .unwrap();

        assert_eq!(analysis.bundle.len(), IndicatorKind::ALL.len() + 1);
        assert_eq!(analysis.bundle.signal(AI_INDICATOR), Some(Signal::Buy));
        assert_eq!(analysis.latest.close, 139.0);
    }

    #[test]
    fn test_predictor_failure_omits_ai() {
        let runner = TimeframeRunner::default();
        let analysis = runner.run(Timeframe::H1, &rising(40), &Broken).unwrap();

        assert!(analysis.bundle.get(AI_INDICATOR).is_none());
        assert_eq!(analysis.bundle.len(), IndicatorKind::ALL.len());
    }

    #[test]
    fn test_short_series_all_neutral() {
        let runner = TimeframeRunner::default();
        let analysis = runner
            .run(Timeframe::H1, &rising(3), &Fixed(Direction::Neutral))
            .unwrap();

        assert!(analysis.bundle.iter().all(|r| r.signal == Signal::Neutral));
        assert_eq!(analysis.atr, 0.0);
    }

    #[test]
    fn test_only_enabled_indicators_run() {
        let config = IndicatorConfig {
            enabled: vec![IndicatorKind::Rsi],
            ..IndicatorConfig::default()
        };
        let runner = TimeframeRunner::new(config);
        let analysis = runner.run(Timeframe::H4, &rising(40), &Broken).unwrap();

        assert_eq!(analysis.bundle.len(), 1);
        assert!(analysis.bundle.get("rsi").is_some());
        // ATR still feeds trade parameters even when not voted
        assert!(analysis.atr > 0.0);
    }

    #[test]
    fn test_empty_series_yields_nothing() {
        let runner = TimeframeRunner::default();
        assert!(runner.run(Timeframe::H1, &[], &Broken).is_none());
    }
}
