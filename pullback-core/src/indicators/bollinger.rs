//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Four series (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//! - Bandwidth: (upper - lower) / middle, NaN when middle is zero
//!
//! Uses population stddev (divide by N) over partial windows.

use super::Indicator;
use crate::domain::Bar;

/// Which Bollinger series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Bandwidth,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
            BollingerBand::Bandwidth => "bandwidth",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }

    pub fn bandwidth(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Bandwidth)
    }

    /// (mean, population stddev) of closes in the trailing window ending at `i`.
    fn window_stats(&self, bars: &[Bar], i: usize) -> (f64, f64) {
        let start = (i + 1).saturating_sub(self.period);
        let window = &bars[start..=i];
        let n = window.len() as f64;
        let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
        let variance = window
            .iter()
            .map(|b| {
                let diff = b.close - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        (mean, variance.sqrt())
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| {
                let (mean, stddev) = self.window_stats(bars, i);
                let width = self.multiplier * stddev;
                match self.band {
                    BollingerBand::Middle => mean,
                    BollingerBand::Upper => mean + width,
                    BollingerBand::Lower => mean - width,
                    BollingerBand::Bandwidth => {
                        if mean == 0.0 || mean.is_nan() {
                            f64::NAN
                        } else {
                            (2.0 * width) / mean
                        }
                    }
                }
            })
            .collect()
    }
}
