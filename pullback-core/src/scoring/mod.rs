//! Scoring: combination adjustments, the confidence gate, and the decision
//! record for each breakout candidate.

pub mod combination;
pub mod daily;
pub mod decision;
pub mod gate;
pub mod scorer;
pub mod stats;

pub use combination::{
    AdjustmentPolicy, CombinationConfig, CombinationHistory, CombinationScore, CombinationTable,
    TableEntry,
};
pub use daily::{DailyContext, DailyStrength, MIN_DAILY_BARS};
pub use decision::{Candidate, Decision, Detection, Gate, GateOutcome, ScoringResult};
pub use gate::{GateConfig, GateOverride, GateRequirement, GateRule, SessionWindow, OTHER_HOURS};
pub use scorer::Scorer;
pub use stats::{FilterStats, FilterStatsSnapshot};
