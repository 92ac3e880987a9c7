use crate::error::{AdvisorError, Result};
use crate::models::Candle;

/// Validates OHLCV candle data before it reaches the indicator engine
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a whole series: every candle, plus strictly increasing timestamps
    pub fn validate_series(&self, candles: &[Candle]) -> Result<()> {
        if candles.is_empty() {
            return Err(AdvisorError::InvalidCandle {
                index: 0,
                reason: "series is empty".to_string(),
            });
        }

        for (index, candle) in candles.iter().enumerate() {
            self.validate(candle)
                .map_err(|reason| AdvisorError::InvalidCandle { index, reason })?;
        }

        for (index, window) in candles.windows(2).enumerate() {
            if window[1].timestamp <= window[0].timestamp {
                return Err(AdvisorError::InvalidCandle {
                    index: index + 1,
                    reason: format!(
                        "timestamp {} does not follow {}",
                        window[1].timestamp, window[0].timestamp
                    ),
                });
            }
        }

        Ok(())
    }

    /// Validate a single candle, returning the reason on failure
    pub fn validate(&self, candle: &Candle) -> std::result::Result<(), String> {
        self.validate_prices(candle)?;
        self.validate_ohlc_relationship(candle)?;
        Ok(())
    }

    /// Validate that all fields are finite and non-negative
    fn validate_prices(&self, candle: &Candle) -> std::result::Result<(), String> {
        let fields = [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
            ("volume", candle.volume),
        ];

        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("Non-finite {}: {}", name, value));
            }
            if value < 0.0 {
                return Err(format!("Invalid {}: {}", name, value));
            }
        }
        Ok(())
    }

    /// High must be >= low
    fn validate_ohlc_relationship(&self, candle: &Candle) -> std::result::Result<(), String> {
        if candle.high < candle.low {
            return Err(format!(
                "High ({}) is less than low ({})",
                candle.high, candle.low
            ));
        }
        Ok(())
    }
}
