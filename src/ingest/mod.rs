// Candle ingestion checks
pub mod validator;

pub use validator::CandleValidator;
