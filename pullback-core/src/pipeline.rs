//! Evaluator: runs bars through every stage and scores each breakout.
//!
//! Data flows one way: bars → features → consolidation → breakout →
//! classifier → scoring. Every intermediate product is kept on the
//! [`Evaluation`] so callers can reconstruct why a candidate was accepted
//! or blocked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, PipelineConfig};
use crate::detection::{
    BreakoutEvent, BreakoutTrigger, ConsolidationDetector, ConsolidationState,
};
use crate::domain::{validate_bars, Bar, BarError, ConfigHash};
use crate::features::{FeatureEngine, FeatureSet};
use crate::scoring::{
    Candidate, CombinationTable, DailyContext, FilterStats, Scorer, ScoringResult,
};
use crate::stages::{NoPattern, PatternClassifier, StagePattern};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("invalid bars: {0}")]
    InvalidBars(#[from] BarError),
}

/// Per-sequence inputs besides the bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// `None` falls back to the gate's missing-context default.
    pub daily: Option<DailyContext>,
}

impl EvaluationContext {
    pub fn with_daily(daily: DailyContext) -> Self {
        Self { daily: Some(daily) }
    }
}

/// One breakout candidate and its fate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub breakout: BreakoutEvent,
    pub pattern: Result<StagePattern, NoPattern>,
    pub result: ScoringResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub features: Vec<FeatureSet>,
    pub consolidation: Vec<ConsolidationState>,
    pub candidates: Vec<CandidateEvaluation>,
}

impl Evaluation {
    pub fn breakouts(&self) -> impl Iterator<Item = &BreakoutEvent> {
        self.candidates.iter().map(|c| &c.breakout)
    }

    pub fn accepted(&self) -> impl Iterator<Item = &CandidateEvaluation> {
        self.candidates.iter().filter(|c| c.result.is_accepted())
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    config: PipelineConfig,
    features: FeatureEngine,
    detector: ConsolidationDetector,
    trigger: BreakoutTrigger,
    classifier: PatternClassifier,
    scorer: Scorer,
}

impl Evaluator {
    /// Validates the config before building the stages.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            features: FeatureEngine::new(config.features.clone()),
            detector: ConsolidationDetector::new(config.consolidation.clone()),
            trigger: BreakoutTrigger::new(config.breakout.clone()),
            classifier: PatternClassifier::new(config.classifier.clone()),
            scorer: Scorer::new(&config.combination, config.gate.clone()),
            config,
        })
    }

    /// Share one combination table across evaluators.
    pub fn with_table(mut self, table: Arc<CombinationTable>) -> Self {
        self.scorer = self.scorer.with_table(table);
        self
    }

    pub fn with_stats(mut self, stats: Arc<FilterStats>) -> Self {
        self.scorer = self.scorer.with_stats(stats);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        self.config.config_hash()
    }

    pub fn classifier(&self) -> &PatternClassifier {
        &self.classifier
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Evaluate one ordered bar sequence (typically one session).
    pub fn evaluate(
        &self,
        bars: &[Bar],
        context: &EvaluationContext,
    ) -> Result<Evaluation, EvaluationError> {
        validate_bars(bars)?;

        let features = self.features.compute(bars);
        let consolidation = self.detector.detect(bars, &features);
        let breakouts = self.trigger.scan(bars, &features, &consolidation);

        let candidates: Vec<CandidateEvaluation> = breakouts
            .into_iter()
            .map(|breakout| self.evaluate_breakout(bars, breakout, context))
            .collect();

        debug!(
            bars = bars.len(),
            breakouts = candidates.len(),
            accepted = candidates.iter().filter(|c| c.result.is_accepted()).count(),
            "evaluation complete"
        );
        Ok(Evaluation {
            features,
            consolidation,
            candidates,
        })
    }

    fn evaluate_breakout(
        &self,
        bars: &[Bar],
        breakout: BreakoutEvent,
        context: &EvaluationContext,
    ) -> CandidateEvaluation {
        let i = breakout.bar_index;
        let hour = bars[i].hour();
        let pattern = self.classifier.classify_at(bars, i);
        let candidate = match &pattern {
            Ok(p) => Candidate::pattern(hour, breakout.entry_price, p.combination_key(), p.confidence),
            Err(reason) => {
                debug!(bar_index = i, %reason, "breakout without stage pattern");
                Candidate::missing(hour, breakout.entry_price, reason.to_string())
            }
        };
        let result = self.scorer.score(&candidate, context.daily);
        CandidateEvaluation {
            breakout,
            pattern,
            result,
        }
    }

    /// Score a candidate built outside the pipeline, e.g. from logged magnitudes.
    pub fn score(&self, candidate: &Candidate, daily: Option<DailyContext>) -> ScoringResult {
        self.scorer.score(candidate, daily)
    }
}
