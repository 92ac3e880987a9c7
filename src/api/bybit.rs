use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::CandleProvider;
use crate::error::{AdvisorError, Result};
use crate::models::{Candle, Timeframe};

/// Bybit returns at most this many klines per request
pub const MAX_KLINE_LIMIT: usize = 1000;

type BybitRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Bybit public market-data settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BybitConfig {
    pub base_url: String,
    /// Product category: spot, linear or inverse
    pub category: String,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    /// Initial backoff, doubled on every retry
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub max_clock_drift_secs: f64,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bybit.com".to_string(),
            category: "spot".to_string(),
            requests_per_minute: 120,
            max_retries: 3,
            retry_backoff_ms: 1000,
            request_timeout_secs: 10,
            max_clock_drift_secs: 5.0,
        }
    }
}

/// Envelope shared by every v5 endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
    /// Server time in milliseconds
    #[serde(default)]
    time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeResult {
    #[serde(default)]
    time_second: Option<String>,
}

/// Bybit v5 REST client for kline history
///
/// Cloneable; all clones share one rate limiter.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    config: BybitConfig,
    rate_limiter: Arc<BybitRateLimiter>,
}

impl BybitClient {
    pub fn new(config: BybitConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    pub fn config(&self) -> &BybitConfig {
        &self.config
    }

    /// Make a rate-limited GET with retry on 429, 5xx and network errors
    async fn make_request(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let max_retries = self.config.max_retries.max(1);

        for attempt in 1..=max_retries {
            self.rate_limiter.until_ready().await;
            let backoff =
                Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(1 << (attempt - 1).min(16)));

            let mut request = self.client.get(&url);
            if !query.is_empty() {
                request = request.query(query);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < max_retries {
                        tracing::warn!(
                            status = %status,
                            attempt,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            "Bybit request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(AdvisorError::Exchange {
                        code: i64::from(status.as_u16()),
                        message: body,
                    });
                }
                Err(e) if attempt < max_retries => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries,
                        "Network error talking to Bybit, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AdvisorError::Exchange {
            code: -1,
            message: format!("failed after {} attempts", max_retries),
        })
    }

    fn parse_envelope<T: serde::de::DeserializeOwned>(body: &str) -> Result<Envelope<T>> {
        let envelope: Envelope<T> = serde_json::from_str(body)
            .map_err(|e| AdvisorError::MalformedPayload(e.to_string()))?;

        if envelope.ret_code != 0 {
            return Err(AdvisorError::Exchange {
                code: envelope.ret_code,
                message: envelope.ret_msg,
            });
        }
        Ok(envelope)
    }

    /// Fetch klines, oldest first
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let symbol = normalize_symbol(symbol);
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);

        tracing::debug!(symbol = %symbol, timeframe = %timeframe, limit, "Fetching Bybit klines");

        let query = [
            ("category", self.config.category.clone()),
            ("symbol", symbol.clone()),
            ("interval", timeframe.bybit_interval().to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self.make_request("/v5/market/kline", &query).await?;
        let envelope: Envelope<KlineResult> = Self::parse_envelope(&body)?;

        let mut candles = envelope
            .result
            .unwrap_or_default()
            .list
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<Result<Vec<_>>>()?;

        // Bybit lists newest first
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        tracing::debug!(symbol = %symbol, timeframe = %timeframe, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    /// Current exchange time
    pub async fn server_time(&self) -> Result<DateTime<Utc>> {
        let body = self.make_request("/v5/market/time", &[]).await?;
        let envelope: Envelope<TimeResult> = Self::parse_envelope(&body)?;

        let from_seconds = envelope
            .result
            .and_then(|r| r.time_second)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        envelope
            .time
            .and_then(DateTime::from_timestamp_millis)
            .or(from_seconds)
            .ok_or_else(|| AdvisorError::MalformedPayload("server time missing".to_string()))
    }

    /// Compare the local clock against exchange time
    ///
    /// Returns the signed drift in seconds (local minus exchange), or
    /// `ClockDrift` when it exceeds the configured maximum.
    pub async fn check_time_sync(&self) -> Result<f64> {
        let server = self.server_time().await?;
        let drift_secs = (Utc::now() - server).num_milliseconds() as f64 / 1000.0;

        if drift_secs.abs() > self.config.max_clock_drift_secs {
            return Err(AdvisorError::ClockDrift {
                drift_secs,
                max_secs: self.config.max_clock_drift_secs,
            });
        }

        tracing::debug!(drift_secs, "Local clock in sync with Bybit");
        Ok(drift_secs)
    }
}

impl CandleProvider for BybitClient {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.fetch_klines(symbol, timeframe, limit).await
    }

    fn name(&self) -> &str {
        "bybit"
    }
}

/// "BTC/USDT", "btc-usdt" and "BTCUSDT" all become "BTCUSDT"
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Parse `[startMs, open, high, low, close, volume, turnover]`
fn parse_kline_row(row: &[String]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(AdvisorError::MalformedPayload(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let number = |idx: usize, name: &str| -> Result<f64> {
        row[idx].parse::<f64>().map_err(|_| {
            AdvisorError::MalformedPayload(format!("bad {} value: {:?}", name, row[idx]))
        })
    };

    let start_ms = row[0]
        .parse::<i64>()
        .map_err(|_| AdvisorError::MalformedPayload(format!("bad start time: {:?}", row[0])))?;
    let timestamp = DateTime::from_timestamp_millis(start_ms)
        .ok_or_else(|| AdvisorError::MalformedPayload(format!("start time out of range: {}", start_ms)))?;

    Ok(Candle {
        timestamp,
        open: number(1, "open")?,
        high: number(2, "high")?,
        low: number(3, "low")?,
        close: number(4, "close")?,
        volume: number(5, "volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_config(base_url: String) -> BybitConfig {
        BybitConfig {
            base_url,
            retry_backoff_ms: 1,
            ..BybitConfig::default()
        }
    }

    const KLINE_BODY: &str = r#"{
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "category": "spot",
            "symbol": "BTCUSDT",
            "list": [
                ["1717200000000", "101.0", "103.0", "100.5", "102.5", "12.5", "1280.0"],
                ["1717196400000", "100.0", "101.5", "99.0", "101.0", "10.0", "1005.0"]
            ]
        },
        "time": 1717200123000
    }"#;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("eth-usdt"), "ETHUSDT");
        assert_eq!(normalize_symbol("SOLUSDT"), "SOLUSDT");
    }

    #[test]
    fn test_parse_kline_row_rejects_garbage() {
        let row: Vec<String> = ["1717200000000", "abc", "1", "1", "1", "1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(matches!(
            parse_kline_row(&row),
            Err(AdvisorError::MalformedPayload(_))
        ));

        let short: Vec<String> = vec!["1717200000000".to_string()];
        assert!(parse_kline_row(&short).is_err());
    }

    #[tokio::test]
    async fn test_fetch_klines_sorted_ascending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("category".into(), "spot".into()),
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "60".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(KLINE_BODY)
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        let candles = client
            .get_candles("BTC/USDT", Timeframe::H1, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[1].close, 102.5);
        assert_eq!(candles[1].volume, 12.5);
    }

    #[tokio::test]
    async fn test_limit_clamped_to_exchange_max() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::UrlEncoded("limit".into(), "1000".into()))
            .with_status(200)
            .with_body(KLINE_BODY)
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        client.fetch_klines("BTCUSDT", Timeframe::H1, 5000).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"retCode": 10001, "retMsg": "Not supported symbols", "result": {}}"#)
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        let err = client
            .fetch_klines("NOPEUSDT", Timeframe::H1, 10)
            .await
            .unwrap_err();

        match err {
            AdvisorError::Exchange { code, message } => {
                assert_eq!(code, 10001);
                assert!(message.contains("Not supported"));
            }
            other => panic!("expected Exchange error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        let err = client.fetch_klines("BTCUSDT", Timeframe::H1, 10).await.unwrap_err();
        assert!(matches!(err, AdvisorError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_retries_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        let err = client.fetch_klines("BTCUSDT", Timeframe::H1, 10).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AdvisorError::Exchange { code: 503, .. }));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::Any)
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        assert!(client.fetch_klines("BTCUSDT", Timeframe::H1, 10).await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_clock_drift_detected() {
        let mut server = mockito::Server::new_async().await;
        let stale = Utc::now() - chrono::Duration::seconds(60);
        server
            .mock("GET", "/v5/market/time")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"retCode":0,"retMsg":"OK","result":{{"timeSecond":"{}"}},"time":{}}}"#,
                stale.timestamp(),
                stale.timestamp_millis()
            ))
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        match client.check_time_sync().await {
            Err(AdvisorError::ClockDrift { drift_secs, max_secs }) => {
                assert!(drift_secs > 55.0);
                assert_eq!(max_secs, 5.0);
            }
            other => panic!("expected ClockDrift, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clock_in_sync() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v5/market/time")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"retCode":0,"retMsg":"OK","result":{{}},"time":{}}}"#,
                Utc::now().timestamp_millis()
            ))
            .create_async()
            .await;

        let client = BybitClient::new(test_config(server.url())).unwrap();
        let drift = client.check_time_sync().await.unwrap();
        assert!(drift.abs() < 5.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access to api.bybit.com
    async fn test_live_bybit_klines() {
        let client = BybitClient::new(BybitConfig::default()).unwrap();
        let candles = client
            .fetch_klines("BTCUSDT", Timeframe::H1, 50)
            .await
            .unwrap();
        assert_eq!(candles.len(), 50);
    }
}
