//! Consolidation detector: flags bars inside a tight, quiet range.
//!
//! For each bar with a full lookback window, five predicates must hold:
//! ATR at or below its quantile threshold, Bollinger bandwidth, zone range
//! relative to mean close, |MA slope|, and short/long volume contraction.
//! NaN inputs fail their predicate. Boundaries are inclusive.
//!
//! The streak counts consecutive consolidated bars and resets to 0 on the
//! first failing bar.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::features::FeatureSet;
use crate::indicators::{quantile_linear, CausalQuantile};

/// How the ATR quantile threshold is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrQuantileMode {
    /// One threshold over the whole series. Reads future bars; research replay only.
    Global,
    /// Expanding-window threshold over ATR values at indices `<= i`.
    #[default]
    Causal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub lookback: usize,
    pub atr_quantile: f64,
    pub atr_quantile_mode: AtrQuantileMode,
    pub bandwidth_max: f64,
    pub range_pct_max: f64,
    pub ma_slope_max: f64,
    pub volume_ratio_max: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            atr_quantile: 0.25,
            atr_quantile_mode: AtrQuantileMode::Causal,
            bandwidth_max: 0.02,
            range_pct_max: 0.006,
            ma_slope_max: 0.0005,
            volume_ratio_max: 0.7,
        }
    }
}

/// Price box spanned by the trailing lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationZone {
    pub low: f64,
    pub high: f64,
    pub start_index: usize,
    pub end_index: usize,
    /// Consolidation streak at `end_index`.
    pub streak_length: usize,
}

/// Outcome of each consolidation predicate at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsolidationChecks {
    pub atr_ok: bool,
    pub bandwidth_ok: bool,
    pub range_ok: bool,
    pub slope_ok: bool,
    pub volume_ok: bool,
}

impl ConsolidationChecks {
    pub fn all(&self) -> bool {
        self.atr_ok && self.bandwidth_ok && self.range_ok && self.slope_ok && self.volume_ok
    }
}

/// Per-bar detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationState {
    /// `None` until the full lookback window is available.
    pub zone: Option<ConsolidationZone>,
    /// (zone high - zone low) / mean close; infinite when mean close is not positive.
    pub range_pct: f64,
    pub atr_threshold: f64,
    pub checks: ConsolidationChecks,
    pub consolidated: bool,
    pub streak_length: usize,
}

impl ConsolidationState {
    fn warming_up(atr_threshold: f64) -> Self {
        Self {
            zone: None,
            range_pct: f64::NAN,
            atr_threshold,
            checks: ConsolidationChecks::default(),
            consolidated: false,
            streak_length: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsolidationDetector {
    config: ConsolidationConfig,
}

/// `value <= max`, false for NaN.
fn at_most(value: f64, max: f64) -> bool {
    !value.is_nan() && value <= max
}

impl ConsolidationDetector {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// ATR threshold per bar under the configured quantile mode.
    pub fn atr_thresholds(&self, features: &[FeatureSet]) -> Vec<f64> {
        let atr: Vec<f64> = features.iter().map(|f| f.atr).collect();
        match self.config.atr_quantile_mode {
            AtrQuantileMode::Global => {
                let q = quantile_linear(&atr, self.config.atr_quantile);
                vec![q; atr.len()]
            }
            AtrQuantileMode::Causal => CausalQuantile::series(&atr, self.config.atr_quantile),
        }
    }

    /// Evaluate the five predicates for bar `i` against a given ATR threshold.
    fn checks_at(
        &self,
        bars: &[Bar],
        features: &[FeatureSet],
        i: usize,
        atr_threshold: f64,
    ) -> (ConsolidationChecks, f64, f64, f64) {
        let cfg = &self.config;
        let start = i + 1 - cfg.lookback.max(1);
        let window = &bars[start..=i];
        let zone_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let zone_high = window
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let mean_close = window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64;
        let range_pct = if mean_close > 0.0 {
            (zone_high - zone_low) / mean_close
        } else {
            f64::INFINITY
        };

        let f = &features[i];
        let checks = ConsolidationChecks {
            atr_ok: !atr_threshold.is_nan() && at_most(f.atr, atr_threshold),
            bandwidth_ok: at_most(f.bandwidth, cfg.bandwidth_max),
            range_ok: at_most(range_pct, cfg.range_pct_max),
            slope_ok: at_most(f.ma_slope.abs(), cfg.ma_slope_max),
            volume_ok: at_most(f.volume_ratio(), cfg.volume_ratio_max),
        };
        (checks, zone_low, zone_high, range_pct)
    }

    /// Per-bar consolidation states. `features` must align with `bars`.
    pub fn detect(&self, bars: &[Bar], features: &[FeatureSet]) -> Vec<ConsolidationState> {
        debug_assert_eq!(bars.len(), features.len());
        let thresholds = self.atr_thresholds(features);
        let lookback = self.config.lookback.max(1);
        let mut states = Vec::with_capacity(bars.len());
        let mut streak = 0usize;

        for i in 0..bars.len() {
            if i + 1 < lookback {
                states.push(ConsolidationState::warming_up(thresholds[i]));
                continue;
            }
            let (checks, low, high, range_pct) = self.checks_at(bars, features, i, thresholds[i]);
            let consolidated = checks.all();
            streak = if consolidated { streak + 1 } else { 0 };
            states.push(ConsolidationState {
                zone: Some(ConsolidationZone {
                    low,
                    high,
                    start_index: i + 1 - lookback,
                    end_index: i,
                    streak_length: streak,
                }),
                range_pct,
                atr_threshold: thresholds[i],
                checks,
                consolidated,
                streak_length: streak,
            });
        }
        states
    }
}
