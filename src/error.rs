use std::time::Duration;
use thiserror::Error;

use crate::models::Timeframe;

/// Library error type
///
/// Only configuration errors are fatal to an analysis run; everything else
/// excludes a single timeframe or indicator from the vote.
#[derive(Error, Debug)]
pub enum AdvisorError {
    // -- Data ---------------------------------------------------------------
    #[error("no candles returned for {symbol} ({timeframe})")]
    EmptySeries { symbol: String, timeframe: Timeframe },

    #[error("invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: String },

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("timed out after {timeout:?} fetching {timeframe}")]
    Timeout { timeframe: Timeframe, timeout: Duration },

    // -- Exchange -----------------------------------------------------------
    #[error("exchange API error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("malformed exchange payload: {0}")]
    MalformedPayload(String),

    #[error("local clock drifts {drift_secs:.2}s from exchange time (max {max_secs:.2}s)")]
    ClockDrift { drift_secs: f64, max_secs: f64 },

    // -- Prediction ---------------------------------------------------------
    #[error("no direction model trained for {0}")]
    ModelNotTrained(Timeframe),

    // -- Configuration ------------------------------------------------------
    #[error("invalid weight for {key}: {value} (weights must be finite and non-negative)")]
    InvalidWeight { key: String, value: f64 },

    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Settings(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
