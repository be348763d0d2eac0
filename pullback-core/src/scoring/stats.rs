//! Filter statistics: counters shared across evaluations.
//!
//! Handles are cloned `Arc<FilterStats>`; counters are relaxed atomics, so a
//! snapshot taken while evaluations run may be mid-update.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::decision::{Decision, Gate, ScoringResult};

#[derive(Debug, Default)]
pub struct FilterStats {
    checked: AtomicU64,
    passed: AtomicU64,
    blocked: AtomicU64,
    blocked_detection: AtomicU64,
    blocked_combination: AtomicU64,
    blocked_confidence: AtomicU64,
}

/// Point-in-time copy of [`FilterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatsSnapshot {
    pub checked: u64,
    pub passed: u64,
    pub blocked: u64,
    pub blocked_detection: u64,
    pub blocked_combination: u64,
    pub blocked_confidence: u64,
}

impl FilterStatsSnapshot {
    pub fn pass_rate(&self) -> f64 {
        if self.checked == 0 {
            0.0
        } else {
            self.passed as f64 / self.checked as f64
        }
    }
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one scored candidate; each blocking gate is counted separately.
    pub fn record(&self, result: &ScoringResult) {
        self.checked.fetch_add(1, Ordering::Relaxed);
        match &result.decision {
            Decision::Accepted => {
                self.passed.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Blocked { gates } => {
                self.blocked.fetch_add(1, Ordering::Relaxed);
                for gate in gates {
                    let counter = match gate {
                        Gate::Detection => &self.blocked_detection,
                        Gate::Combination => &self.blocked_combination,
                        Gate::Confidence => &self.blocked_confidence,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            checked: self.checked.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            blocked_detection: self.blocked_detection.load(Ordering::Relaxed),
            blocked_combination: self.blocked_combination.load(Ordering::Relaxed),
            blocked_confidence: self.blocked_confidence.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.checked,
            &self.passed,
            &self.blocked,
            &self.blocked_detection,
            &self.blocked_combination,
            &self.blocked_confidence,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}
