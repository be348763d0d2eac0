//! Breakout trigger: a bullish, high-conviction bar leaving a consolidation.
//!
//! Bar `i` fires when bar `i - 1` was consolidated for at least
//! `min_persist_bars` and bar `i`:
//! - closes above the previous zone high plus a buffer,
//! - is bullish with body/range at or above `body_ratio_min`,
//! - shows a volume spike over the long volume average or a range of at
//!   least `atr_range_multiple` ATRs.
//!
//! The zone attached to an event always ends before the event bar.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::consolidation::{ConsolidationState, ConsolidationZone};
use crate::domain::Bar;
use crate::features::FeatureSet;

/// Lower bound for the candle range in the body ratio denominator.
const MIN_RANGE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    pub min_persist_bars: usize,
    pub breakout_buffer: f64,
    pub body_ratio_min: f64,
    pub volume_spike_multiple: f64,
    pub atr_range_multiple: f64,
    /// Entry = low + (high - low) * entry_range_fraction.
    pub entry_range_fraction: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            min_persist_bars: 4,
            breakout_buffer: 0.0005,
            body_ratio_min: 0.5,
            volume_spike_multiple: 1.2,
            atr_range_multiple: 0.8,
            entry_range_fraction: 0.5,
        }
    }
}

/// A fired breakout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakoutEvent {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub entry_price: f64,
    /// Zone of the previous bar; `end_index < bar_index`.
    pub zone_reference: ConsolidationZone,
    pub body_ratio: f64,
    pub volume_spike: bool,
    pub range_expansion: bool,
}

#[derive(Debug, Clone)]
pub struct BreakoutTrigger {
    config: BreakoutConfig,
}

impl BreakoutTrigger {
    pub fn new(config: BreakoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BreakoutConfig {
        &self.config
    }

    /// Evaluate bar `i` given per-bar features and consolidation states.
    pub fn evaluate(
        &self,
        bars: &[Bar],
        features: &[FeatureSet],
        states: &[ConsolidationState],
        i: usize,
    ) -> Option<BreakoutEvent> {
        let cfg = &self.config;
        if i == 0 || i >= bars.len() {
            return None;
        }
        let prev = &states[i - 1];
        if !prev.consolidated || prev.streak_length < cfg.min_persist_bars {
            return None;
        }
        let zone = prev.zone?;
        if !(zone.high.is_finite() && zone.low.is_finite()) {
            return None;
        }

        let bar = &bars[i];
        let f = &features[i];
        let range = bar.range();
        let body_ratio = bar.body() / range.max(MIN_RANGE);
        let atr = if f.atr.is_nan() { 0.0 } else { f.atr };
        let volume_spike = bar.volume >= cfg.volume_spike_multiple * f.vol_long_avg;
        let range_expansion = range >= cfg.atr_range_multiple * atr;

        let fires = bar.is_bullish()
            && bar.close > zone.high * (1.0 + cfg.breakout_buffer)
            && body_ratio >= cfg.body_ratio_min
            && (volume_spike || range_expansion);
        if !fires {
            return None;
        }

        let entry_price = bar.low + range * cfg.entry_range_fraction;
        debug!(
            bar_index = i,
            zone_high = zone.high,
            entry_price,
            body_ratio,
            volume_spike,
            range_expansion,
            "breakout fired"
        );
        Some(BreakoutEvent {
            bar_index: i,
            timestamp: bar.timestamp,
            entry_price,
            zone_reference: zone,
            body_ratio,
            volume_spike,
            range_expansion,
        })
    }

    /// All breakout events in bar order.
    pub fn scan(
        &self,
        bars: &[Bar],
        features: &[FeatureSet],
        states: &[ConsolidationState],
    ) -> Vec<BreakoutEvent> {
        (1..bars.len())
            .filter_map(|i| self.evaluate(bars, features, states, i))
            .collect()
    }

    /// Zone visible from each bar: element `i` is the zone computed at `i - 1`.
    pub fn lagged_zones(states: &[ConsolidationState]) -> Vec<Option<ConsolidationZone>> {
        std::iter::once(None)
            .chain(states.iter().take(states.len().saturating_sub(1)).map(|s| s.zone))
            .take(states.len())
            .collect()
    }
}
