use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::aggregator::aggregate;
use super::runner::{TimeframeAnalysis, TimeframeRunner};
use super::trade::{TradeConfig, TradeParameterCalculator};
use super::weights::WeightConfig;
use crate::api::CandleProvider;
use crate::error::{AdvisorError, Result};
use crate::indicators::IndicatorConfig;
use crate::ingest::CandleValidator;
use crate::models::{AnalysisReport, Timeframe, TimeframeBundle};
use crate::predictor::DirectionPredictor;

/// Run-level knobs
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Candles requested per timeframe
    pub candle_limit: usize,
    /// Upper bound on each timeframe's fetch
    pub timeout: Duration,
    /// Timeframe whose latest candle and ATR price the trade; falls back to
    /// the first requested timeframe that succeeded
    pub primary_timeframe: Option<Timeframe>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            candle_limit: 200,
            timeout: Duration::from_secs(15),
            primary_timeframe: None,
        }
    }
}

/// Multi-timeframe analyzer
///
/// Fans out one task per timeframe, then votes and prices the trade. The
/// provider and predictor are shared read-only across tasks; dropping the
/// `analyze` future aborts any task still running.
pub struct Analyzer<P, M> {
    provider: Arc<P>,
    predictor: Arc<M>,
    runner: Arc<TimeframeRunner>,
    trade: TradeParameterCalculator,
    options: AnalysisOptions,
}

impl<P, M> Analyzer<P, M>
where
    P: CandleProvider + 'static,
    M: DirectionPredictor + 'static,
{
    pub fn new(provider: Arc<P>, predictor: Arc<M>) -> Self {
        Self {
            provider,
            predictor,
            runner: Arc::new(TimeframeRunner::default()),
            trade: TradeParameterCalculator::default(),
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_indicators(mut self, config: IndicatorConfig) -> Self {
        self.runner = Arc::new(TimeframeRunner::new(config));
        self
    }

    pub fn with_trade_config(mut self, config: TradeConfig) -> Self {
        self.trade = TradeParameterCalculator::new(config);
        self
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    /// Swap in a retrained predictor for subsequent runs
    pub fn replace_predictor(&mut self, predictor: Arc<M>) {
        self.predictor = predictor;
    }

    pub fn predictor(&self) -> &Arc<M> {
        &self.predictor
    }

    /// Analyze `symbol` over the requested timeframes
    ///
    /// Never fails: unavailable timeframes are logged and left out, and with
    /// none left the report is a Hold with confidence 0.
    pub async fn analyze(
        &self,
        symbol: &str,
        timeframes: &[String],
        weights: &WeightConfig,
    ) -> AnalysisReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", %run_id, symbol);

        self.analyze_inner(run_id, symbol, timeframes, weights)
            .instrument(span)
            .await
    }

    async fn analyze_inner(
        &self,
        run_id: Uuid,
        symbol: &str,
        timeframes: &[String],
        weights: &WeightConfig,
    ) -> AnalysisReport {
        let requested = parse_timeframes(timeframes);

        tracing::info!(
            provider = self.provider.name(),
            timeframes = ?requested,
            "Starting analysis"
        );

        let mut tasks = JoinSet::new();
        for (index, &timeframe) in requested.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let predictor = Arc::clone(&self.predictor);
            let runner = Arc::clone(&self.runner);
            let symbol = symbol.to_string();
            let limit = self.options.candle_limit;
            let timeout = self.options.timeout;

            let task = async move {
                let outcome = analyze_timeframe(
                    provider.as_ref(),
                    predictor.as_ref(),
                    &runner,
                    &symbol,
                    timeframe,
                    limit,
                    timeout,
                )
                .await;
                (index, timeframe, outcome)
            };
            tasks.spawn(task.instrument(tracing::info_span!("timeframe", %timeframe)));
        }

        let mut slots: Vec<Option<TimeframeAnalysis>> = vec![None; requested.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(analysis))) => slots[index] = Some(analysis),
                Ok((_, timeframe, Err(e))) => {
                    tracing::warn!(timeframe = %timeframe, error = %e, "Timeframe unavailable, excluded from vote");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Timeframe task failed, excluded from vote");
                }
            }
        }

        let analyses: Vec<TimeframeAnalysis> = slots.into_iter().flatten().collect();
        let bundles: Vec<TimeframeBundle> = analyses.iter().map(|a| a.bundle.clone()).collect();
        let participating: Vec<Timeframe> = bundles.iter().map(|b| b.timeframe).collect();

        let primary = self
            .options
            .primary_timeframe
            .and_then(|tf| analyses.iter().find(|a| a.bundle.timeframe == tf))
            .or_else(|| analyses.first());

        let recommendation = aggregate(&bundles, weights);
        let trade_parameters = self
            .trade
            .calculate(&recommendation, primary, &participating);

        tracing::info!(
            action = ?recommendation.action,
            confidence = recommendation.confidence,
            participating = participating.len(),
            requested = requested.len(),
            "Analysis complete"
        );

        AnalysisReport {
            run_id,
            symbol: symbol.to_string(),
            generated_at: Utc::now(),
            per_timeframe: bundles,
            recommendation,
            trade_parameters,
        }
    }
}

/// Fetch, validate and compute one timeframe
async fn analyze_timeframe<P, M>(
    provider: &P,
    predictor: &M,
    runner: &TimeframeRunner,
    symbol: &str,
    timeframe: Timeframe,
    limit: usize,
    timeout: Duration,
) -> Result<TimeframeAnalysis>
where
    P: CandleProvider,
    M: DirectionPredictor,
{
    let candles = tokio::time::timeout(timeout, provider.get_candles(symbol, timeframe, limit))
        .await
        .map_err(|_| AdvisorError::Timeout { timeframe, timeout })??;

    if candles.is_empty() {
        return Err(AdvisorError::EmptySeries {
            symbol: symbol.to_string(),
            timeframe,
        });
    }

    CandleValidator::new().validate_series(&candles)?;

    if candles.len() < runner.config().max_lookback() {
        tracing::debug!(
            candles = candles.len(),
            required = runner.config().max_lookback(),
            "Short history, some indicators will be neutral"
        );
    }

    runner
        .run(timeframe, &candles, predictor)
        .ok_or_else(|| AdvisorError::EmptySeries {
            symbol: symbol.to_string(),
            timeframe,
        })
}

/// Parse requested timeframe strings, dropping unknown ones and repeats
fn parse_timeframes(timeframes: &[String]) -> Vec<Timeframe> {
    let mut parsed: Vec<Timeframe> = Vec::with_capacity(timeframes.len());

    for raw in timeframes {
        match raw.parse::<Timeframe>() {
            Ok(tf) if parsed.contains(&tf) => {
                tracing::warn!(timeframe = %raw, "Duplicate timeframe ignored");
            }
            Ok(tf) => parsed.push(tf),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unknown timeframe");
            }
        }
    }

    parsed
}
