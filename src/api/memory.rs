use std::collections::HashMap;

use super::CandleProvider;
use crate::error::Result;
use crate::models::{Candle, Timeframe};

/// Serves caller-supplied candle series
///
/// Used when the calling layer already holds the data (a GUI cache, a CSV
/// import, tests). Unknown symbol/timeframe pairs yield an empty series.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<(String, Timeframe), Vec<Candle>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series for a symbol and timeframe, replacing any previous one
    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        self.insert(symbol, timeframe, candles);
        self
    }

    pub fn insert(&mut self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) {
        self.series
            .insert((symbol.to_uppercase(), timeframe), candles);
    }
}

impl CandleProvider for InMemoryProvider {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let candles = self
            .series
            .get(&(symbol.to_uppercase(), timeframe))
            .map(|series| {
                let start = series.len().saturating_sub(limit);
                series[start..].to_vec()
            })
            .unwrap_or_default();

        Ok(candles)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
