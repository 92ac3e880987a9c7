use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::api::BybitConfig;
use crate::engine::{AnalysisOptions, TradeConfig, WeightConfig};
use crate::error::{AdvisorError, Result};
use crate::indicators::IndicatorConfig;
use crate::models::Timeframe;
use crate::predictor::PredictorConfig;

/// Settings file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "cryptoadvisor.toml";

/// Environment prefix; `ADVISOR__ANALYSIS__SYMBOL=ETHUSDT` sets `analysis.symbol`
pub const ENV_PREFIX: &str = "ADVISOR";

/// What to analyze and how long to wait for it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub symbol: String,
    pub timeframes: Vec<String>,
    pub primary_timeframe: Option<String>,
    pub candle_limit: usize,
    pub timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            timeframes: vec![
                "15m".to_string(),
                "1h".to_string(),
                "4h".to_string(),
                "1d".to_string(),
            ],
            primary_timeframe: Some("1h".to_string()),
            candle_limit: 200,
            timeout_secs: 15,
        }
    }
}

/// Raw vote weights as written in the settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightSettings {
    pub timeframes: HashMap<String, f64>,
    pub indicators: HashMap<String, f64>,
}

impl Default for WeightSettings {
    fn default() -> Self {
        let timeframes = [("15m", 0.5), ("1h", 1.0), ("4h", 1.5), ("1d", 2.0)];
        let indicators = [
            ("supertrend", 1.5),
            ("ema", 1.0),
            ("macd", 1.0),
            ("rsi", 1.0),
            ("bollinger", 0.5),
            ("ai", 1.0),
        ];

        Self {
            timeframes: timeframes
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            indicators: indicators
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub indicators: IndicatorConfig,
    pub weights: WeightSettings,
    pub trade: TradeConfig,
    pub provider: BybitConfig,
    pub predictor: PredictorConfig,
}

impl Settings {
    /// Load defaults, then the settings file, then `ADVISOR__*` variables
    ///
    /// An explicit `path` must exist; otherwise `cryptoadvisor.toml` is
    /// read only if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!(symbol = %settings.analysis.symbol, "Settings loaded");
        Ok(settings)
    }

    /// Parse settings from a TOML string (no environment overrides)
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("analysis.timeframes")
            .with_list_parse_key("indicators.enabled")
            .with_list_parse_key("predictor.training_symbols")
            .try_parsing(true)
    }

    /// Reject settings that would make every run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.analysis.symbol.trim().is_empty() {
            return Err(AdvisorError::Config("analysis.symbol is empty".to_string()));
        }
        if self.analysis.candle_limit == 0 {
            return Err(AdvisorError::Config(
                "analysis.candle_limit must be positive".to_string(),
            ));
        }
        if self.analysis.timeout_secs == 0 {
            return Err(AdvisorError::Config(
                "analysis.timeout_secs must be positive".to_string(),
            ));
        }
        if self.indicators.rsi_oversold >= self.indicators.rsi_overbought {
            return Err(AdvisorError::Config(format!(
                "indicators.rsi_oversold ({}) must be below rsi_overbought ({})",
                self.indicators.rsi_oversold, self.indicators.rsi_overbought
            )));
        }
        if self.indicators.ema_short_period >= self.indicators.ema_long_period
            || self.indicators.macd_fast_period >= self.indicators.macd_slow_period
        {
            return Err(AdvisorError::Config(
                "short EMA periods must be below long ones".to_string(),
            ));
        }
        if let Some(primary) = &self.analysis.primary_timeframe {
            primary.parse::<Timeframe>()?;
        }
        self.trade.validate()?;

        // Surfaces bad weights at load time
        self.weight_config()?;
        Ok(())
    }

    /// Validated weights
    pub fn weight_config(&self) -> Result<WeightConfig> {
        let timeframes = self
            .weights
            .timeframes
            .iter()
            .map(|(tf, w)| tf.parse::<Timeframe>().map(|tf| (tf, *w)))
            .collect::<Result<Vec<_>>>()?;

        WeightConfig::new(
            timeframes,
            self.weights
                .indicators
                .iter()
                .map(|(name, w)| (name.to_lowercase(), *w)),
        )
    }

    pub fn analysis_options(&self) -> Result<AnalysisOptions> {
        let primary_timeframe = self
            .analysis
            .primary_timeframe
            .as_deref()
            .map(str::parse::<Timeframe>)
            .transpose()?;

        Ok(AnalysisOptions {
            candle_limit: self.analysis.candle_limit,
            timeout: Duration::from_secs(self.analysis.timeout_secs),
            primary_timeframe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());

        let weights = settings.weight_config().unwrap();
        assert_eq!(weights.timeframe_weight(Timeframe::D1), 2.0);
        assert_eq!(weights.indicator_weight("supertrend"), 1.5);

        let options = settings.analysis_options().unwrap();
        assert_eq!(options.primary_timeframe, Some(Timeframe::H1));
        assert_eq!(options.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_from_toml_overrides_sections() {
        let settings = Settings::from_toml(
            r#"
            [analysis]
            symbol = "ETHUSDT"
            timeframes = ["5m", "1h"]
            candle_limit = 300

            [indicators]
            rsi_period = 21

            [weights.timeframes]
            "5m" = 0.25
            "1h" = 1.0

            [provider]
            category = "linear"
            "#,
        )
        .unwrap();

        assert_eq!(settings.analysis.symbol, "ETHUSDT");
        assert_eq!(settings.analysis.timeframes, vec!["5m", "1h"]);
        assert_eq!(settings.analysis.candle_limit, 300);
        assert_eq!(settings.analysis.timeout_secs, 15);
        assert_eq!(settings.indicators.rsi_period, 21);
        assert_eq!(settings.indicators.ema_long_period, 21);
        assert_eq!(settings.provider.category, "linear");
        assert_eq!(settings.provider.max_retries, 3);

        let weights = settings.weight_config().unwrap();
        assert_eq!(weights.timeframe_weight(Timeframe::M5), 0.25);
        assert_eq!(weights.timeframe_weight(Timeframe::D1), 0.0);
    }

    #[test]
    fn test_negative_weight_is_fatal() {
        let result = Settings::from_toml(
            r#"
            [weights.indicators]
            ema = -1.0
            "#,
        );
        assert!(matches!(result, Err(AdvisorError::InvalidWeight { .. })));
    }

    #[test]
    fn test_unknown_weight_timeframe_is_fatal() {
        let result = Settings::from_toml(
            r#"
            [weights.timeframes]
            "7h" = 1.0
            "#,
        );
        assert!(matches!(result, Err(AdvisorError::UnknownTimeframe(_))));
    }

    #[test]
    fn test_inverted_rsi_thresholds_rejected() {
        let result = Settings::from_toml(
            r#"
            [indicators]
            rsi_overbought = 20.0
            rsi_oversold = 80.0
            "#,
        );
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_inverted_trade_probability_bounds_rejected() {
        let result = Settings::from_toml(
            r#"
            [trade]
            min_probability = 0.9
            max_probability = 0.6
            "#,
        );
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_timeframe_alias_weight_given_twice_rejected() {
        // "60" is an alias of "1h"
        let result = Settings::from_toml(
            r#"
            [weights.timeframes]
            "1h" = 1.0
            "60" = 5.0
            "#,
        );
        assert!(matches!(result, Err(AdvisorError::Config(_))));
    }

    #[test]
    fn test_example_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("cryptoadvisor.example.toml");
        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.analysis.timeframes.len(), 4);
        assert_eq!(settings.indicators.enabled.len(), 6);
        assert_eq!(settings.predictor.training_symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/cryptoadvisor.toml")));
        assert!(matches!(result, Err(AdvisorError::Settings(_))));
    }
}
