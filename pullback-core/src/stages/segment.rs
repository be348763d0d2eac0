//! Stage segments and the full pattern produced by the classifier.

use serde::{Deserialize, Serialize};

use super::buckets::{CandleDirection, CombinationKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Uptrend,
    Decline,
    Support,
}

/// One contiguous stage of the pattern.
///
/// `magnitude` is in percent: cumulative close-to-close gain for an
/// uptrend, retracement from the uptrend's last close for a decline,
/// close volatility (stddev / mean) for a support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSegment {
    pub kind: StageKind,
    pub start_index: usize,
    pub end_index: usize,
    pub candle_count: usize,
    pub magnitude: f64,
}

impl StageSegment {
    pub fn new(kind: StageKind, start_index: usize, end_index: usize, magnitude: f64) -> Self {
        Self {
            kind,
            start_index,
            end_index,
            candle_count: end_index + 1 - start_index,
            magnitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UptrendStage {
    pub segment: StageSegment,
    /// Fractional gain (0.05 = 5%).
    pub gain: f64,
    pub high_price: f64,
    pub avg_volume: f64,
    /// Highest volume in the analysis window; the yardstick for every volume ratio.
    pub reference_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeclineStage {
    pub segment: StageSegment,
    /// Fractional retracement.
    pub decline: f64,
    pub low_price: f64,
    pub avg_volume_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportStage {
    pub segment: StageSegment,
    pub support_price: f64,
    /// Close stddev / mean close.
    pub volatility: f64,
    pub avg_volume_ratio: f64,
}

/// The breakout candle as the classifier measured it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakoutProfile {
    pub bar_index: usize,
    pub body: f64,
    pub volume: f64,
    /// Body relative to the mean support body, minus one.
    pub body_increase: f64,
    /// Volume relative to the previous bar, minus one.
    pub volume_change: f64,
    pub direction: CandleDirection,
}

/// A complete uptrend → decline → support → breakout structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagePattern {
    pub uptrend: UptrendStage,
    pub decline: DeclineStage,
    pub support: SupportStage,
    pub breakout: BreakoutProfile,
    /// Open + 4/5 of the breakout body.
    pub entry_price: f64,
    /// Base confidence, 0-100.
    pub confidence: f64,
}

impl StagePattern {
    pub fn segments(&self) -> [StageSegment; 3] {
        [
            self.uptrend.segment,
            self.decline.segment,
            self.support.segment,
        ]
    }

    /// Bucketed key including the breakout direction.
    pub fn combination_key(&self) -> CombinationKey {
        CombinationKey::from_magnitudes(
            self.uptrend.segment.magnitude,
            self.decline.segment.magnitude,
            self.support.segment.candle_count as f64,
        )
        .with_breakout(self.breakout.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_counts_inclusive() {
        let s = StageSegment::new(StageKind::Decline, 7, 9, 1.2);
        assert_eq!(s.candle_count, 3);
    }
}
