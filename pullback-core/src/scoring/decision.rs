//! Decision records: the auditable output of scoring one candidate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::daily::DailyContext;
use crate::stages::buckets::CombinationKey;

/// The three independent gates a candidate must clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Detection,
    Combination,
    Confidence,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gate::Detection => "detection",
            Gate::Combination => "combination",
            Gate::Confidence => "confidence",
        })
    }
}

/// Outcome of one gate with the numbers that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate: Gate,
    pub passed: bool,
    pub values: BTreeMap<String, f64>,
    pub reason: String,
}

impl GateOutcome {
    pub fn new(gate: Gate, passed: bool, reason: impl Into<String>) -> Self {
        Self {
            gate,
            passed,
            values: BTreeMap::new(),
            reason: reason.into(),
        }
    }

    pub fn with_value(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Blocked { gates: Vec<Gate> },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }

    pub fn blocked_by(&self, gate: Gate) -> bool {
        match self {
            Decision::Accepted => false,
            Decision::Blocked { gates } => gates.contains(&gate),
        }
    }
}

/// What the classifier concluded about a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detection {
    Pattern {
        key: CombinationKey,
        base_confidence: f64,
    },
    Missing {
        reason: String,
    },
}

/// A breakout candidate ready to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Exchange-local hour of the candidate bar.
    pub hour: u32,
    pub entry_price: f64,
    pub detection: Detection,
}

impl Candidate {
    pub fn pattern(hour: u32, entry_price: f64, key: CombinationKey, base_confidence: f64) -> Self {
        Self {
            hour,
            entry_price,
            detection: Detection::Pattern {
                key,
                base_confidence,
            },
        }
    }

    pub fn missing(hour: u32, entry_price: f64, reason: impl Into<String>) -> Self {
        Self {
            hour,
            entry_price,
            detection: Detection::Missing {
                reason: reason.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub base_confidence: f64,
    pub bonus_or_penalty: i32,
    pub adjusted_confidence: f64,
    pub decision: Decision,
    pub reason: String,

    pub key: Option<CombinationKey>,
    /// Table key that supplied the adjustment.
    pub matched_key: Option<CombinationKey>,
    pub hour: u32,
    pub window: String,
    pub daily_context: DailyContext,
    pub used_default_context: bool,
    pub required_confidence: f64,
    pub entry_price: f64,
    pub gates: Vec<GateOutcome>,
}

impl ScoringResult {
    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }

    pub fn gate(&self, gate: Gate) -> Option<&GateOutcome> {
        self.gates.iter().find(|g| g.gate == gate)
    }
}
