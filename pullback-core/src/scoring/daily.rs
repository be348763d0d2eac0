//! Daily pattern strength: the auxiliary context the confidence gate reads.
//!
//! Derived from the last five daily bars of at least ten: five-day price
//! change, five-day volume change, and the last close against its 3-day MA.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Daily bars required before a strength is reported.
pub const MIN_DAILY_BARS: usize = 10;
const RECENT_DAYS: usize = 5;
const MA_DAYS: usize = 3;

/// Strength (0-100) plus the "ideal" flag consumed by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyContext {
    pub strength: f64,
    pub ideal: bool,
}

impl DailyContext {
    pub fn new(strength: f64, ideal: bool) -> Self {
        Self { strength, ideal }
    }

    /// Used when no daily data is available.
    pub fn conservative() -> Self {
        Self {
            strength: 0.0,
            ideal: false,
        }
    }

    pub fn from_daily_bars(bars: &[Bar]) -> Option<Self> {
        DailyStrength::from_daily_bars(bars).map(|s| s.context())
    }
}

impl Default for DailyContext {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Strength with the measurements that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyStrength {
    pub price_change_pct: f64,
    pub volume_change_pct: f64,
    /// Last close relative to the 3-day close MA, percent.
    pub ma_position_pct: f64,
    pub strength: f64,
    pub ideal: bool,
}

impl DailyStrength {
    /// `None` when fewer than [`MIN_DAILY_BARS`] bars are given.
    pub fn from_daily_bars(bars: &[Bar]) -> Option<Self> {
        if bars.len() < MIN_DAILY_BARS {
            return None;
        }
        let recent = &bars[bars.len() - RECENT_DAYS..];
        let first = &recent[0];
        let last = &recent[RECENT_DAYS - 1];

        let price_change_pct = pct_change(first.close, last.close);
        let volume_change_pct = pct_change(first.volume, last.volume);
        let ma3 = recent[RECENT_DAYS - MA_DAYS..]
            .iter()
            .map(|b| b.close)
            .sum::<f64>()
            / MA_DAYS as f64;
        let ma_position_pct = pct_change(ma3, last.close);

        Some(Self::score(price_change_pct, volume_change_pct, ma_position_pct))
    }

    /// Score the three measurements.
    pub fn score(price_change_pct: f64, volume_change_pct: f64, ma_position_pct: f64) -> Self {
        let mut strength: f64 = 50.0;

        if price_change_pct > 5.0 {
            strength += 30.0;
        } else if price_change_pct > 3.0 {
            strength += 20.0;
        } else if price_change_pct > 1.0 {
            strength += 10.0;
        } else if price_change_pct < -3.0 {
            strength -= 20.0;
        }

        // Shrinking volume into the move scores.
        if volume_change_pct < -20.0 {
            strength += 25.0;
        } else if volume_change_pct < -10.0 {
            strength += 15.0;
        } else if volume_change_pct < 0.0 {
            strength += 5.0;
        } else if volume_change_pct > 20.0 {
            strength -= 15.0;
        }

        if ma_position_pct > 3.0 {
            strength += 15.0;
        } else if ma_position_pct > 1.0 {
            strength += 10.0;
        } else if ma_position_pct > 0.0 {
            strength += 5.0;
        } else if ma_position_pct < -3.0 {
            strength -= 15.0;
        }

        let ideal = price_change_pct > 2.0 && volume_change_pct < -10.0 && ma_position_pct > 0.0;
        if ideal {
            strength += 10.0;
        }

        Self {
            price_change_pct,
            volume_change_pct,
            ma_position_pct,
            strength: strength.clamp(0.0, 100.0),
            ideal,
        }
    }

    pub fn context(&self) -> DailyContext {
        DailyContext::new(self.strength, self.ideal)
    }
}

/// Percent change from `from` to `to`; 0 when `from` is not positive.
fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}
