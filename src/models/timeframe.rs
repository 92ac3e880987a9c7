use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdvisorError;

/// Candle granularity, ordered from shortest to longest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H12,
    D1,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 12] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// Canonical label ("1h", "4h", "1d", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::W1 => "1w",
        }
    }

    /// Length of one candle in minutes
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M3 => 3,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H4 => 240,
            Self::H6 => 360,
            Self::H12 => 720,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
        }
    }

    /// Bybit v5 kline interval code
    pub fn bybit_interval(&self) -> &'static str {
        match self {
            Self::M1 => "1",
            Self::M3 => "3",
            Self::M5 => "5",
            Self::M15 => "15",
            Self::M30 => "30",
            Self::H1 => "60",
            Self::H2 => "120",
            Self::H4 => "240",
            Self::H6 => "360",
            Self::H12 => "720",
            Self::D1 => "D",
            Self::W1 => "W",
        }
    }

    /// Timeframes of 4 hours and above imply a long holding horizon
    pub fn is_long_horizon(&self) -> bool {
        self.minutes() >= Timeframe::H4.minutes()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = AdvisorError;

    /// Accepts canonical labels ("4h") and Bybit interval codes ("240", "D")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let timeframe = match normalized.as_str() {
            "1m" | "1" => Self::M1,
            "3m" | "3" => Self::M3,
            "5m" | "5" => Self::M5,
            "15m" | "15" => Self::M15,
            "30m" | "30" => Self::M30,
            "1h" | "60" => Self::H1,
            "2h" | "120" => Self::H2,
            "4h" | "240" => Self::H4,
            "6h" | "360" => Self::H6,
            "12h" | "720" => Self::H12,
            "1d" | "d" => Self::D1,
            "1w" | "w" => Self::W1,
            _ => return Err(AdvisorError::UnknownTimeframe(s.to_string())),
        };
        Ok(timeframe)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = AdvisorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(timeframe: Timeframe) -> Self {
        timeframe.as_str().to_string()
    }
}
