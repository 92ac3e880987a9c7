// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod ingest;
pub mod models;
pub mod predictor;

// Re-export commonly used types
pub use api::{BybitClient, CandleProvider, InMemoryProvider, SyntheticProvider};
pub use engine::{Analyzer, WeightConfig};
pub use models::*;
pub use predictor::{DirectionPredictor, ModelStore};

// Error handling
pub use error::{AdvisorError, Result};
