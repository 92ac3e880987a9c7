use serde::{Deserialize, Serialize};

use super::Direction;
use crate::models::Candle;

/// One-lag autoregression on close-to-close returns
///
/// `r[t] = intercept + slope * r[t-1]`, fitted by ordinary least squares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnModel {
    pub intercept: f64,
    pub slope: f64,
    /// Number of (r[t-1], r[t]) pairs the fit used
    pub samples: usize,
}

/// Close-to-close simple returns, skipping pairs with a zero base price
pub fn returns(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect()
}

impl ReturnModel {
    /// Fit over several independent series
    ///
    /// Lag pairs never span two series. Returns None when no series has at
    /// least three candles.
    pub fn fit<'a, I>(series: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [Candle]>,
    {
        let pairs: Vec<(f64, f64)> = series
            .into_iter()
            .flat_map(|candles| {
                let r = returns(candles);
                r.windows(2).map(|w| (w[0], w[1])).collect::<Vec<_>>()
            })
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();

        if pairs.is_empty() {
            return None;
        }

        let n = pairs.len() as f64;
        let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (cov, var) = pairs.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
            (cov + (x - mean_x) * (y - mean_y), var + (x - mean_x).powi(2))
        });

        // Constant lag returns carry no slope information
        let slope = if var > f64::EPSILON { cov / var } else { 0.0 };
        let intercept = mean_y - slope * mean_x;

        Some(Self {
            intercept,
            slope,
            samples: pairs.len(),
        })
    }

    /// Expected next return given the series so far
    pub fn predict_return(&self, candles: &[Candle]) -> Option<f64> {
        if candles.len() < 3 {
            return None;
        }
        let last = returns(&candles[candles.len() - 2..]);
        last.first().map(|r| self.intercept + self.slope * r)
    }

    pub fn predict(&self, candles: &[Candle], neutral_band: f64) -> Direction {
        match self.predict_return(candles) {
            Some(r) if r > neutral_band => Direction::Up,
            Some(r) if r < -neutral_band => Direction::Down,
            _ => Direction::Neutral,
        }
    }
}
