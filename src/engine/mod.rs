// Analysis engine
// Per-timeframe bundles -> weighted vote -> trade parameters

pub mod aggregator;
pub mod orchestrator;
pub mod runner;
pub mod trade;
pub mod weights;

pub use aggregator::aggregate;
pub use orchestrator::{AnalysisOptions, Analyzer};
pub use runner::{TimeframeAnalysis, TimeframeRunner};
pub use trade::{TradeConfig, TradeParameterCalculator};
pub use weights::WeightConfig;

/// Round to 2 decimals for output
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
