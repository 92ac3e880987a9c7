pub mod bybit;
pub mod memory;
pub mod synthetic;

pub use bybit::{BybitClient, BybitConfig};
pub use memory::InMemoryProvider;
pub use synthetic::{MarketScenario, SyntheticProvider};

use std::future::Future;

use crate::error::Result;
use crate::models::{Candle, Timeframe};

/// Source of historical candles
///
/// Implementations may fail or return an empty series; the analyzer treats
/// both as "timeframe unavailable". Retries and rate limiting belong here,
/// not in the analyzer.
pub trait CandleProvider: Send + Sync {
    /// Up to `limit` most recent candles, oldest first
    fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;

    /// Provider name for logs
    fn name(&self) -> &str;
}
