//! Moving-average slope: fractional change of SMA(close) bar over bar.
//!
//! slope[i] = (ma[i] - ma[i-1]) / ma[i-1]
//! NaN at i = 0 and wherever the denominator is zero.

use super::{Indicator, Sma};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MaSlope {
    ma: Sma,
    name: String,
}

impl MaSlope {
    pub fn new(period: usize) -> Self {
        Self {
            ma: Sma::close(period),
            name: format!("ma_slope_{period}"),
        }
    }

    /// Slope series from an already computed moving average.
    pub fn from_ma(ma: &[f64]) -> Vec<f64> {
        (0..ma.len())
            .map(|i| {
                if i == 0 {
                    return f64::NAN;
                }
                let prev = ma[i - 1];
                if prev == 0.0 || prev.is_nan() {
                    f64::NAN
                } else {
                    (ma[i] - prev) / prev
                }
            })
            .collect()
    }
}

impl Indicator for MaSlope {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        Self::from_ma(&self.ma.compute(bars))
    }
}
