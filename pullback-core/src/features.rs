//! Rolling feature engine: per-bar FeatureSets from trailing windows.
//!
//! Features at bar `i` are a pure function of bars `0..=i`. The engine
//! computes whole series once through the [`Indicator`] implementations and
//! also answers single-bar queries from a bounded trailing slice.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Bar;
use crate::indicators::{true_range, Atr, Bollinger, Indicator, MaSlope, Sma};

/// Window sizes and multipliers for the feature engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub atr_window: usize,
    pub bb_window: usize,
    pub bb_std_multiplier: f64,
    pub ma_window: usize,
    pub vol_short_window: usize,
    pub vol_long_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            atr_window: 14,
            bb_window: 20,
            bb_std_multiplier: 2.0,
            ma_window: 20,
            vol_short_window: 5,
            vol_long_window: 20,
        }
    }
}

impl FeatureConfig {
    /// Widest trailing window any feature reads.
    pub fn max_window(&self) -> usize {
        self.atr_window
            .max(self.bb_window)
            .max(self.ma_window)
            .max(self.vol_short_window)
            .max(self.vol_long_window)
    }
}

/// Rolling features of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub atr: f64,
    pub true_range: f64,
    pub bollinger_mid: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    /// (upper - lower) / mid; NaN when mid is zero.
    pub bandwidth: f64,
    pub ma: f64,
    /// Fractional change of `ma` from the previous bar; NaN at bar 0.
    pub ma_slope: f64,
    pub vol_short_avg: f64,
    pub vol_long_avg: f64,
}

impl FeatureSet {
    /// Short/long volume average ratio; NaN when the long average is not positive.
    pub fn volume_ratio(&self) -> f64 {
        if self.vol_long_avg > 0.0 {
            self.vol_short_avg / self.vol_long_avg
        } else {
            f64::NAN
        }
    }
}

/// Computes FeatureSets for a bar series.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
    atr: Atr,
    bb_mid: Bollinger,
    bb_upper: Bollinger,
    bb_lower: Bollinger,
    bandwidth: Bollinger,
    ma: Sma,
    vol_short: Sma,
    vol_long: Sma,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Self {
        let m = config.bb_std_multiplier;
        Self {
            atr: Atr::new(config.atr_window),
            bb_mid: Bollinger::middle(config.bb_window, m),
            bb_upper: Bollinger::upper(config.bb_window, m),
            bb_lower: Bollinger::lower(config.bb_window, m),
            bandwidth: Bollinger::bandwidth(config.bb_window, m),
            ma: Sma::close(config.ma_window),
            vol_short: Sma::volume(config.vol_short_window),
            vol_long: Sma::volume(config.vol_long_window),
            config,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Feature series for every bar.
    pub fn compute(&self, bars: &[Bar]) -> Vec<FeatureSet> {
        let tr = true_range(bars);
        let atr = self.atr.compute(bars);
        let mid = self.bb_mid.compute(bars);
        let upper = self.bb_upper.compute(bars);
        let lower = self.bb_lower.compute(bars);
        let bandwidth = self.bandwidth.compute(bars);
        let ma = self.ma.compute(bars);
        let slope = MaSlope::from_ma(&ma);
        let vol_short = self.vol_short.compute(bars);
        let vol_long = self.vol_long.compute(bars);

        debug!(bars = bars.len(), "computed rolling features");

        (0..bars.len())
            .map(|i| FeatureSet {
                atr: atr[i],
                true_range: tr[i],
                bollinger_mid: mid[i],
                bollinger_upper: upper[i],
                bollinger_lower: lower[i],
                bandwidth: bandwidth[i],
                ma: ma[i],
                ma_slope: slope[i],
                vol_short_avg: vol_short[i],
                vol_long_avg: vol_long[i],
            })
            .collect()
    }

    /// FeatureSet for bar `i` using only bars `..=i`.
    ///
    /// Reads at most `max_window + 1` bars, so cost is O(window).
    /// Returns `None` when `i` is out of range.
    pub fn at(&self, bars: &[Bar], i: usize) -> Option<FeatureSet> {
        if i >= bars.len() {
            return None;
        }
        let start = i.saturating_sub(self.config.max_window());
        self.compute(&bars[start..=i]).last().copied()
    }
}
