use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::CandleProvider;
use crate::error::Result;
use crate::models::{Candle, Timeframe};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Sideways/choppy market (mean-reverting)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
}

/// Offline candle source generating seeded synthetic series
///
/// Every call derives its RNG from the base seed, the symbol and the
/// timeframe, so the same request always yields the same prices and
/// concurrent timeframe fetches share nothing.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    scenario: MarketScenario,
    base_price: f64,
    base_volume: f64,
    end_time: Option<DateTime<Utc>>,
}

impl SyntheticProvider {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64, scenario: MarketScenario) -> Self {
        Self {
            seed,
            scenario,
            base_price: 150.0,
            base_volume: 1_000_000.0,
            end_time: None,
        }
    }

    /// Pin the timestamp of the last generated candle (defaults to now)
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Generate candles for the configured scenario
    pub fn generate(&self, symbol: &str, timeframe: Timeframe, num_candles: usize) -> Vec<Candle> {
        let mut rng = StdRng::seed_from_u64(self.derive_seed(symbol, timeframe));
        let interval = Duration::minutes(i64::from(timeframe.minutes()));

        let end = self.end_time.unwrap_or_else(Utc::now);
        let end = end.duration_trunc(interval).unwrap_or(end);
        let start = end - interval * (num_candles.saturating_sub(1) as i32);

        // Daily drift expressed per candle
        let candles_per_day = 1_440.0 / f64::from(timeframe.minutes());
        let drift_per_candle = match self.scenario {
            MarketScenario::Uptrend => 0.02 / candles_per_day,
            MarketScenario::Downtrend => -0.02 / candles_per_day,
            MarketScenario::Sideways | MarketScenario::Volatile => 0.0,
        };

        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;

        for i in 0..num_candles {
            let timestamp = start + interval * i as i32;

            let change = match self.scenario {
                MarketScenario::Uptrend | MarketScenario::Downtrend => {
                    // Reduced noise so the trend is dominant
                    current_price * drift_per_candle
                        + current_price * rng.gen_range(-0.001..0.001)
                }
                MarketScenario::Sideways => {
                    (self.base_price - current_price) * 0.1
                        + current_price * rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => current_price * rng.gen_range(-0.05..0.05),
            };
            current_price = (current_price + change).max(self.base_price * 0.5);

            candles.push(self.create_candle(&mut rng, current_price, timestamp));
        }

        candles
    }

    fn derive_seed(&self, symbol: &str, timeframe: Timeframe) -> u64 {
        symbol
            .to_uppercase()
            .bytes()
            .fold(self.seed ^ u64::from(timeframe.minutes()), |acc, b| {
                acc.wrapping_mul(31).wrapping_add(u64::from(b))
            })
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(&self, rng: &mut StdRng, price: f64, timestamp: DateTime<Utc>) -> Candle {
        // ±0.2% intrabar movement
        let noise_pct = 0.002;

        let high = price * (1.0 + rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - rng.gen_range(0.0..noise_pct));

        let open_raw = price * (1.0 + rng.gen_range(-noise_pct..noise_pct));
        let open = open_raw.clamp(low, high);

        // Vary volume ±30%
        let volume = self.base_volume * rng.gen_range(0.7..1.3);

        Candle {
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }
}

impl CandleProvider for SyntheticProvider {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        Ok(self.generate(symbol, timeframe, limit))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::CandleValidator;
    use chrono::TimeZone;

    fn end_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_generate_uptrend() {
        let gen = SyntheticProvider::new(42, MarketScenario::Uptrend).with_end_time(end_time());
        let candles = gen.generate("BTCUSDT", Timeframe::H1, 500);

        assert_eq!(candles.len(), 500);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(
            last_price > first_price,
            "Uptrend should end higher: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let gen = SyntheticProvider::new(42, MarketScenario::Downtrend).with_end_time(end_time());
        let candles = gen.generate("BTCUSDT", Timeframe::H1, 500);

        let first_price = candles.first().unwrap().close;
        let last_price = candles.last().unwrap().close;
        assert!(
            last_price < first_price,
            "Downtrend should end lower: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_sideways() {
        let gen = SyntheticProvider::new(42, MarketScenario::Sideways).with_end_time(end_time());
        let candles = gen.generate("BTCUSDT", Timeframe::M15, 500);

        // Should stay roughly around base price (±10%)
        for candle in &candles {
            assert!(
                candle.close > 135.0 && candle.close < 165.0,
                "Sideways should stay near base: {}",
                candle.close
            );
        }
    }

    #[test]
    fn test_same_request_is_reproducible() {
        let gen = SyntheticProvider::new(7, MarketScenario::Volatile).with_end_time(end_time());

        let a = gen.generate("ETHUSDT", Timeframe::H4, 100);
        let b = gen.generate("ETHUSDT", Timeframe::H4, 100);
        let other_tf = gen.generate("ETHUSDT", Timeframe::H1, 100);

        assert_eq!(a, b);
        assert_ne!(a, other_tf);
    }

    #[test]
    fn test_candles_pass_validation() {
        let gen = SyntheticProvider::new(42, MarketScenario::Volatile).with_end_time(end_time());
        let candles = gen.generate("SOLUSDT", Timeframe::D1, 200);

        assert!(CandleValidator::new().validate_series(&candles).is_ok());
        assert_eq!(candles.last().unwrap().timestamp, end_time().duration_trunc(Duration::days(1)).unwrap());
        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::days(1));
        }
    }

    #[tokio::test]
    async fn test_provider_honours_limit() {
        let gen = SyntheticProvider::new(1, MarketScenario::Uptrend).with_end_time(end_time());
        let candles = gen.get_candles("BTCUSDT", Timeframe::H1, 42).await.unwrap();
        assert_eq!(candles.len(), 42);
    }
}
