//! Simple Moving Average (SMA) over close prices or volume.
//!
//! Partial windows at the start of the series; lookback 0.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

/// Which bar field the average is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Close,
    Volume,
}

impl PriceSource {
    pub fn extract(self, bar: &Bar) -> f64 {
        match self {
            PriceSource::Close => bar.close,
            PriceSource::Volume => bar.volume,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    source: PriceSource,
    name: String,
}

impl Sma {
    pub fn new(period: usize, source: PriceSource) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let label = match source {
            PriceSource::Close => "close",
            PriceSource::Volume => "volume",
        };
        Self {
            period,
            source,
            name: format!("sma_{label}_{period}"),
        }
    }

    pub fn close(period: usize) -> Self {
        Self::new(period, PriceSource::Close)
    }

    pub fn volume(period: usize) -> Self {
        Self::new(period, PriceSource::Volume)
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values: Vec<f64> = bars.iter().map(|b| self.source.extract(b)).collect();
        rolling_mean(&values, self.period)
    }
}
