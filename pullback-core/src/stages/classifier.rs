//! Multi-stage pattern classifier.
//!
//! Treats the last bar as a breakout candidate and searches the trailing
//! analysis window for an uptrend, an immediately following low-volume
//! decline, and an immediately following quiet support, each within length
//! limits. Every volume ratio is measured against the highest volume in the
//! window. The best-scoring structure wins; the search stops at the first
//! one whose confidence reaches `early_exit_confidence`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::buckets::CandleDirection;
use super::segment::{
    BreakoutProfile, DeclineStage, StageKind, StagePattern, StageSegment, SupportStage,
    UptrendStage,
};
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Bars ending at the candidate that the search may use.
    pub analysis_window: usize,
    pub min_bars: usize,
    /// How far back (in bars) an uptrend may start.
    pub uptrend_search_span: usize,
    pub max_uptrend_len: usize,
    pub max_decline_len: usize,
    pub max_support_len: usize,

    pub uptrend_min_gain: f64,
    /// Uptrend's last close must reach this fraction of the stage high.
    pub uptrend_end_high_ratio: f64,
    pub decline_min_pct: f64,
    pub decline_max_volume_ratio: f64,
    pub support_max_volume_ratio: f64,
    pub support_soft_volume_ratio: f64,
    /// How many support candles may exceed `support_soft_volume_ratio`.
    pub support_max_soft_count: usize,
    pub support_min_drop_from_high: f64,
    pub support_volatility_threshold: f64,
    pub breakout_body_increase: f64,
    pub breakout_prev_body_multiple: f64,
    pub breakout_max_volume_ratio: f64,

    pub entry_body_fraction: f64,
    pub early_exit_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            analysis_window: 35,
            min_bars: 5,
            uptrend_search_span: 25,
            max_uptrend_len: 15,
            max_decline_len: 15,
            max_support_len: 10,
            uptrend_min_gain: 0.03,
            uptrend_end_high_ratio: 0.8,
            decline_min_pct: 0.005,
            decline_max_volume_ratio: 0.6,
            support_max_volume_ratio: 0.5,
            support_soft_volume_ratio: 0.3,
            support_max_soft_count: 1,
            support_min_drop_from_high: 0.01,
            support_volatility_threshold: 0.015,
            breakout_body_increase: 0.1,
            breakout_prev_body_multiple: 5.0 / 3.0,
            breakout_max_volume_ratio: 0.5,
            entry_body_fraction: 0.8,
            early_exit_confidence: 75.0,
        }
    }
}

/// Why no pattern was produced for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoPattern {
    #[error("need at least {required} bars, have {available}")]
    InsufficientBars { available: usize, required: usize },
    #[error("candidate candle is not bullish")]
    BearishCandidate,
    #[error("candidate close does not exceed the previous close")]
    CloseNotAbovePrevious,
    #[error("candidate high does not exceed the previous high")]
    HighNotAbovePrevious,
    #[error("candidate volume does not exceed the previous volume")]
    VolumeNotAbovePrevious,
    #[error("no uptrend/decline/support sequence fits before the candidate")]
    NoStageSequence,
}

/// Analysis window: local indices plus the offset back into the caller's slice.
struct Window<'a> {
    bars: &'a [Bar],
    offset: usize,
    reference_volume: f64,
}

impl Window<'_> {
    fn segment(&self, kind: StageKind, start: usize, end: usize, magnitude: f64) -> StageSegment {
        StageSegment::new(kind, self.offset + start, self.offset + end, magnitude)
    }

    fn volume_ratios(&self, start: usize, end: usize) -> impl Iterator<Item = f64> + '_ {
        let rv = self.reference_volume;
        self.bars[start..=end].iter().map(move |b| b.volume / rv)
    }

    fn avg_volume_ratio(&self, start: usize, end: usize) -> f64 {
        if self.reference_volume > 0.0 {
            mean(self.bars[start..=end].iter().map(|b| b.volume)) / self.reference_volume
        } else {
            0.0
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    config: ClassifierConfig,
}

impl PatternClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify with `bars[index]` as the breakout candidate.
    pub fn classify_at(&self, bars: &[Bar], index: usize) -> Result<StagePattern, NoPattern> {
        match bars.get(..=index) {
            Some(prefix) => self.classify(prefix),
            None => Err(NoPattern::InsufficientBars {
                available: bars.len(),
                required: index + 1,
            }),
        }
    }

    /// Classify with the last bar as the breakout candidate.
    ///
    /// Segment indices in the result refer to positions in `bars`.
    pub fn classify(&self, bars: &[Bar]) -> Result<StagePattern, NoPattern> {
        let cfg = &self.config;
        let required = cfg.min_bars.max(5);
        let offset = bars.len().saturating_sub(cfg.analysis_window.max(required));
        let local = &bars[offset..];
        let n = local.len();
        if n < required {
            return Err(NoPattern::InsufficientBars {
                available: n,
                required,
            });
        }

        let b = n - 1;
        let candidate = &local[b];
        let prev = &local[b - 1];
        if !candidate.is_bullish() {
            return Err(NoPattern::BearishCandidate);
        }
        if candidate.close <= prev.close {
            return Err(NoPattern::CloseNotAbovePrevious);
        }
        if candidate.high <= prev.high {
            return Err(NoPattern::HighNotAbovePrevious);
        }
        if candidate.volume <= prev.volume {
            return Err(NoPattern::VolumeNotAbovePrevious);
        }

        let w = Window {
            bars: local,
            offset,
            reference_volume: local.iter().map(|x| x.volume).fold(0.0, f64::max),
        };
        let max_uptrend = cfg.max_uptrend_len.min(n - 4);
        let mut best: Option<StagePattern> = None;

        'search: for us in n.saturating_sub(cfg.uptrend_search_span)..n - 4 {
            for ue in us + 1..(us + max_uptrend).min(n - 3) {
                let Some(uptrend) = self.uptrend(&w, us, ue) else {
                    continue;
                };
                let ds = ue + 1;
                for de in ds + 1..(ds + cfg.max_decline_len).min(n - 2) {
                    let Some(decline) = self.decline(&w, w.bars[ue].close, ds, de) else {
                        continue;
                    };
                    let ss = de + 1;
                    for se in ss..(ss + cfg.max_support_len).min(n - 1) {
                        let Some(support) = self.support(&w, &uptrend, ss, se) else {
                            continue;
                        };
                        let Some(breakout) = self.breakout(&w, ss, se, b) else {
                            continue;
                        };
                        let confidence = base_confidence(&uptrend, &decline, &support, &breakout);
                        if best.map_or(true, |p| confidence > p.confidence) {
                            best = Some(StagePattern {
                                uptrend,
                                decline,
                                support,
                                breakout,
                                entry_price: candidate.open
                                    + (candidate.close - candidate.open) * cfg.entry_body_fraction,
                                confidence,
                            });
                            if confidence >= cfg.early_exit_confidence {
                                break 'search;
                            }
                        }
                    }
                }
            }
        }

        match best {
            Some(pattern) => {
                debug!(
                    key = %pattern.combination_key(),
                    confidence = pattern.confidence,
                    candidate = offset + b,
                    "stage pattern found"
                );
                Ok(pattern)
            }
            None => Err(NoPattern::NoStageSequence),
        }
    }

    fn uptrend(&self, w: &Window<'_>, s: usize, e: usize) -> Option<UptrendStage> {
        let cfg = &self.config;
        if e < s + 1 {
            return None;
        }
        let start_close = w.bars[s].close;
        let end_close = w.bars[e].close;
        if start_close <= 0.0 {
            return None;
        }
        let gain = end_close / start_close - 1.0;
        if gain < cfg.uptrend_min_gain {
            return None;
        }
        let stage = &w.bars[s..=e];
        let high_price = stage.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        if end_close < high_price * cfg.uptrend_end_high_ratio {
            return None;
        }
        Some(UptrendStage {
            segment: w.segment(StageKind::Uptrend, s, e, gain * 100.0),
            gain,
            high_price,
            avg_volume: mean(stage.iter().map(|b| b.volume)),
            reference_volume: w.reference_volume,
        })
    }

    fn decline(&self, w: &Window<'_>, anchor_close: f64, s: usize, e: usize) -> Option<DeclineStage> {
        let cfg = &self.config;
        if e < s + 1 || anchor_close <= 0.0 {
            return None;
        }
        let low_price = w.bars[s..=e]
            .iter()
            .map(|b| b.close)
            .fold(f64::INFINITY, f64::min);
        let decline = (anchor_close - low_price) / anchor_close;
        if decline < cfg.decline_min_pct {
            return None;
        }
        if w.reference_volume > 0.0
            && w.volume_ratios(s, e).any(|r| r > cfg.decline_max_volume_ratio)
        {
            return None;
        }
        Some(DeclineStage {
            segment: w.segment(StageKind::Decline, s, e, decline * 100.0),
            decline,
            low_price,
            avg_volume_ratio: w.avg_volume_ratio(s, e),
        })
    }

    fn support(
        &self,
        w: &Window<'_>,
        uptrend: &UptrendStage,
        s: usize,
        e: usize,
    ) -> Option<SupportStage> {
        let cfg = &self.config;
        if w.reference_volume > 0.0 {
            if w.volume_ratios(s, e).any(|r| r > cfg.support_max_volume_ratio) {
                return None;
            }
            let soft = w
                .volume_ratios(s, e)
                .filter(|r| *r > cfg.support_soft_volume_ratio)
                .count();
            if soft > cfg.support_max_soft_count {
                return None;
            }
        }

        let closes = &w.bars[s..=e];
        let support_price = mean(closes.iter().map(|b| b.close));
        if uptrend.high_price > 0.0
            && (uptrend.high_price - support_price) / uptrend.high_price
                < cfg.support_min_drop_from_high
        {
            return None;
        }
        let volatility = if closes.len() > 1 && support_price > 0.0 {
            let var = mean(closes.iter().map(|b| (b.close - support_price).powi(2)));
            var.sqrt() / support_price
        } else {
            0.0
        };
        if volatility > cfg.support_volatility_threshold {
            return None;
        }
        Some(SupportStage {
            segment: w.segment(StageKind::Support, s, e, volatility * 100.0),
            support_price,
            volatility,
            avg_volume_ratio: w.avg_volume_ratio(s, e),
        })
    }

    fn breakout(&self, w: &Window<'_>, ss: usize, se: usize, b: usize) -> Option<BreakoutProfile> {
        let cfg = &self.config;
        let candle = &w.bars[b];
        if !candle.is_bullish() {
            return None;
        }
        let body = candle.body();
        let prev = &w.bars[b - 1];
        let opens_high = candle.open > prev.body_midpoint();
        let outgrows = body >= prev.body() * cfg.breakout_prev_body_multiple;
        if !(opens_high || outgrows) {
            return None;
        }

        let support_body = mean(w.bars[ss..=se].iter().map(Bar::body));
        let body_increase = if support_body > 0.0 {
            body / support_body - 1.0
        } else {
            0.0
        };
        if body_increase < cfg.breakout_body_increase {
            return None;
        }
        if w.reference_volume > 0.0
            && candle.volume / w.reference_volume > cfg.breakout_max_volume_ratio
        {
            return None;
        }
        let volume_change = if prev.volume > 0.0 {
            candle.volume / prev.volume - 1.0
        } else {
            0.0
        };
        Some(BreakoutProfile {
            bar_index: w.offset + b,
            body,
            volume: candle.volume,
            body_increase,
            volume_change,
            direction: CandleDirection::of(candle.open, candle.close),
        })
    }
}

/// Confidence of a complete pattern: 75 plus quality points, capped at 100.
pub fn base_confidence(
    uptrend: &UptrendStage,
    decline: &DeclineStage,
    support: &SupportStage,
    breakout: &BreakoutProfile,
) -> f64 {
    let mut confidence = 75.0;

    if uptrend.gain >= 0.05 {
        confidence += 8.0;
    } else if uptrend.gain >= 0.03 {
        confidence += 4.0;
    }
    if uptrend.reference_volume > uptrend.avg_volume * 1.5 {
        confidence += 2.0;
    }

    if decline.decline >= 0.03 {
        confidence += 5.0;
    } else if decline.decline >= 0.015 {
        confidence += 2.0;
    }
    if decline.avg_volume_ratio <= 0.3 {
        confidence += 3.0;
    }

    if support.segment.candle_count >= 3 {
        confidence += 2.0;
    }
    if support.avg_volume_ratio <= 0.25 {
        confidence += 3.0;
    }
    if support.volatility <= 0.003 {
        confidence += 2.0;
    }

    if breakout.body_increase >= 0.8 {
        confidence += 7.0;
    } else if breakout.body_increase >= 0.5 {
        confidence += 4.0;
    }
    if breakout.volume_change >= 0.2 {
        confidence += 3.0;
    }

    f64::min(confidence, 100.0)
}
