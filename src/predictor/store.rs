use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::{Direction, DirectionPredictor, PredictorConfig, ReturnModel};
use crate::api::CandleProvider;
use crate::error::{AdvisorError, Result};
use crate::ingest::CandleValidator;
use crate::models::{Candle, Timeframe};

/// Training series per timeframe (one entry per symbol)
pub type TrainingSamples = HashMap<Timeframe, Vec<Vec<Candle>>>;

/// Whether the store should be retrained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    NeverTrained,
    Fresh { next_due: DateTime<Utc> },
    Stale { days_since: i64 },
}

/// One direction model per timeframe
///
/// Created empty at startup, shared read-only behind an `Arc` while a run is
/// in flight, and replaced wholesale by a retrain. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct ModelStore {
    config: PredictorConfig,
    models: HashMap<Timeframe, ReturnModel>,
    trained_at: Option<DateTime<Utc>>,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl ModelStore {
    /// Store with no trained models; every prediction fails with ModelNotTrained
    pub fn empty() -> Self {
        Self::with_config(PredictorConfig::default())
    }

    pub fn with_config(config: PredictorConfig) -> Self {
        Self {
            config,
            models: HashMap::new(),
            trained_at: None,
        }
    }

    /// Fit a fresh store from training series
    ///
    /// Timeframes without a usable series get no model.
    pub fn train(config: PredictorConfig, samples: &TrainingSamples, now: DateTime<Utc>) -> Self {
        let lookback = config.lookback.max(3);
        let mut models = HashMap::new();

        for (timeframe, series) in samples {
            let windows = series.iter().map(|candles| {
                let start = candles.len().saturating_sub(lookback);
                &candles[start..]
            });

            match ReturnModel::fit(windows) {
                Some(model) => {
                    tracing::info!(
                        timeframe = %timeframe,
                        samples = model.samples,
                        slope = model.slope,
                        "Trained direction model"
                    );
                    models.insert(*timeframe, model);
                }
                None => {
                    tracing::warn!(timeframe = %timeframe, "Not enough data to train direction model");
                }
            }
        }

        Self {
            config,
            models,
            trained_at: Some(now),
        }
    }

    /// Retrain with this store's settings, producing a replacement store
    pub fn retrain(&self, samples: &TrainingSamples, now: DateTime<Utc>) -> Self {
        Self::train(self.config.clone(), samples, now)
    }

    /// Fetch training series for every symbol and timeframe, then train
    ///
    /// One task per timeframe; failed or invalid fetches are skipped.
    pub async fn train_from_provider<P>(
        config: PredictorConfig,
        provider: Arc<P>,
        symbols: &[String],
        timeframes: &[Timeframe],
        now: DateTime<Utc>,
    ) -> Self
    where
        P: CandleProvider + 'static,
    {
        let mut tasks = JoinSet::new();

        for &timeframe in timeframes {
            let provider = Arc::clone(&provider);
            let symbols = symbols.to_vec();
            let limit = config.training_limit;

            tasks.spawn(async move {
                let validator = CandleValidator::new();
                let mut series = Vec::new();

                for symbol in &symbols {
                    match provider.get_candles(symbol, timeframe, limit).await {
                        Ok(candles) => match validator.validate_series(&candles) {
                            Ok(()) => series.push(candles),
                            Err(e) => tracing::warn!(
                                symbol = %symbol,
                                timeframe = %timeframe,
                                error = %e,
                                "Skipping invalid training series"
                            ),
                        },
                        Err(e) => tracing::warn!(
                            symbol = %symbol,
                            timeframe = %timeframe,
                            provider = provider.name(),
                            error = %e,
                            "Failed to fetch training series"
                        ),
                    }
                }

                (timeframe, series)
            });
        }

        let mut samples = TrainingSamples::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((timeframe, series)) if !series.is_empty() => {
                    samples.insert(timeframe, series);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Training fetch task failed"),
            }
        }

        Self::train(config, &samples, now)
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        self.trained_at
    }

    pub fn model(&self, timeframe: Timeframe) -> Option<&ReturnModel> {
        self.models.get(&timeframe)
    }

    pub fn is_trained(&self, timeframe: Timeframe) -> bool {
        self.models.contains_key(&timeframe)
    }

    pub fn training_status(&self, now: DateTime<Utc>) -> TrainingStatus {
        let Some(trained_at) = self.trained_at else {
            return TrainingStatus::NeverTrained;
        };

        let interval = Duration::days(self.config.retrain_interval_days);
        let days_since = (now - trained_at).num_days();

        if now - trained_at >= interval {
            TrainingStatus::Stale { days_since }
        } else {
            TrainingStatus::Fresh {
                next_due: trained_at + interval,
            }
        }
    }
}

impl DirectionPredictor for ModelStore {
    fn predict_direction(&self, timeframe: Timeframe, candles: &[Candle]) -> Result<Direction> {
        let model = self
            .models
            .get(&timeframe)
            .ok_or(AdvisorError::ModelNotTrained(timeframe))?;

        Ok(model.predict(candles, self.config.neutral_band))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryProvider;
    use crate::indicators::test_support::candles_from_closes;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn rising(n: usize) -> Vec<Candle> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 * 1.01f64.powi(i as i32)).collect();
        candles_from_closes(&closes)
    }

    #[test]
    fn test_empty_store_not_trained() {
        let store = ModelStore::empty();
        let result = store.predict_direction(Timeframe::H1, &rising(10));

        assert!(matches!(result, Err(AdvisorError::ModelNotTrained(Timeframe::H1))));
        assert_eq!(store.training_status(now()), TrainingStatus::NeverTrained);
    }

    #[test]
    fn test_train_builds_per_timeframe_models() {
        let mut samples = TrainingSamples::new();
        samples.insert(Timeframe::H1, vec![rising(50)]);
        samples.insert(Timeframe::H4, vec![candles_from_closes(&[100.0, 101.0])]);

        let store = ModelStore::train(PredictorConfig::default(), &samples, now());

        assert!(store.is_trained(Timeframe::H1));
        assert!(!store.is_trained(Timeframe::H4));
        assert_eq!(
            store.predict_direction(Timeframe::H1, &rising(20)).unwrap(),
            Direction::Up
        );
        assert!(store.predict_direction(Timeframe::H4, &rising(20)).is_err());
    }

    #[test]
    fn test_training_status_lifecycle() {
        let mut samples = TrainingSamples::new();
        samples.insert(Timeframe::H1, vec![rising(50)]);
        let store = ModelStore::train(PredictorConfig::default(), &samples, now());

        match store.training_status(now() + Duration::days(2)) {
            TrainingStatus::Fresh { next_due } => assert_eq!(next_due, now() + Duration::days(7)),
            other => panic!("expected Fresh, got {:?}", other),
        }

        assert_eq!(
            store.training_status(now() + Duration::days(9)),
            TrainingStatus::Stale { days_since: 9 }
        );
    }

    #[test]
    fn test_retrain_replaces_models() {
        let store = ModelStore::empty();
        let mut samples = TrainingSamples::new();
        samples.insert(Timeframe::D1, vec![rising(30)]);

        let retrained = store.retrain(&samples, now());
        assert!(!store.is_trained(Timeframe::D1));
        assert!(retrained.is_trained(Timeframe::D1));
        assert_eq!(retrained.trained_at(), Some(now()));
    }

    #[tokio::test]
    async fn test_train_from_provider_skips_missing_series() {
        let provider = Arc::new(InMemoryProvider::new().with_series("BTCUSDT", Timeframe::H1, rising(60)));
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        let store = ModelStore::train_from_provider(
            PredictorConfig::default(),
            provider,
            &symbols,
            &[Timeframe::H1, Timeframe::H4],
            now(),
        )
        .await;

        assert!(store.is_trained(Timeframe::H1));
        assert!(!store.is_trained(Timeframe::H4));
        assert_eq!(store.model(Timeframe::H1).unwrap().samples, 58);
    }
}
