//! Pullback Core: intraday pullback-breakout detection and scoring.
//!
//! This crate contains the whole pattern pipeline:
//! - Domain types (bars, session ids, config hashes)
//! - Rolling indicators and per-bar feature sets
//! - Consolidation detection and the breakout trigger
//! - Multi-stage classification (uptrend → decline → support → breakout)
//! - Combination scoring, the time-of-day confidence gate and filter stats
//! - Configuration profiles and the end-to-end evaluator

pub mod config;
pub mod detection;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod pipeline;
pub mod scoring;
pub mod stages;

pub use config::{ConfigError, PipelineConfig, Profile};
pub use pipeline::{CandidateEvaluation, Evaluation, EvaluationContext, EvaluationError, Evaluator};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed to worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::SessionId>();
        require_sync::<domain::SessionId>();
        require_send::<domain::ConfigHash>();
        require_sync::<domain::ConfigHash>();

        // Stage products
        require_send::<features::FeatureSet>();
        require_sync::<features::FeatureSet>();
        require_send::<detection::ConsolidationState>();
        require_sync::<detection::ConsolidationState>();
        require_send::<detection::BreakoutEvent>();
        require_sync::<detection::BreakoutEvent>();
        require_send::<stages::StagePattern>();
        require_sync::<stages::StagePattern>();
        require_send::<scoring::ScoringResult>();
        require_sync::<scoring::ScoringResult>();

        // Shared handles
        require_send::<scoring::CombinationTable>();
        require_sync::<scoring::CombinationTable>();
        require_send::<scoring::FilterStats>();
        require_sync::<scoring::FilterStats>();
        require_send::<Evaluator>();
        require_sync::<Evaluator>();
        require_send::<PipelineConfig>();
        require_sync::<PipelineConfig>();
    }
}
