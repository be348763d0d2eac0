//! Stages: segmentation of the bars before a breakout candidate into
//! uptrend, decline and support, and the buckets those stages fall into.

pub mod buckets;
pub mod classifier;
pub mod segment;

pub use buckets::{
    parse_magnitude, CandleDirection, CombinationKey, DeclineDepth, MagnitudeRecord,
    ParseKeyError, SupportLength, UptrendStrength,
};
pub use classifier::{base_confidence, ClassifierConfig, NoPattern, PatternClassifier};
pub use segment::{
    BreakoutProfile, DeclineStage, StageKind, StagePattern, StageSegment, SupportStage,
    UptrendStage,
};
