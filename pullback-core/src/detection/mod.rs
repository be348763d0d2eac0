//! Detection: consolidation zones and the breakouts that leave them.
//!
//! Both stages read bars plus precomputed [`FeatureSet`](crate::features::FeatureSet)s
//! and never look past the bar being evaluated.

pub mod breakout;
pub mod consolidation;

pub use breakout::{BreakoutConfig, BreakoutEvent, BreakoutTrigger};
pub use consolidation::{
    AtrQuantileMode, ConsolidationChecks, ConsolidationConfig, ConsolidationDetector,
    ConsolidationState, ConsolidationZone,
};
