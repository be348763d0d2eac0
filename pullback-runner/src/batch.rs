//! Batch evaluation over many (instrument, session) pairs.
//!
//! Sessions are evaluated independently on the rayon pool. The combination
//! table is shared read-only and every session reports into one
//! [`FilterStats`] handle. Report order follows the input order, which is
//! session order when the input comes from the loader, so results do not
//! depend on thread scheduling.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use pullback_core::domain::{Bar, ConfigHash, SessionId};
use pullback_core::scoring::{
    CombinationTable, DailyContext, FilterStats, FilterStatsSnapshot, ScoringResult,
};
use pullback_core::stages::{CombinationKey, NoPattern};
use pullback_core::{ConfigError, EvaluationContext, Evaluator, PipelineConfig};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::data_loader::{self, LoadError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("load: {0}")]
    Load(#[from] LoadError),

    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

/// One session ready for evaluation.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub session: SessionId,
    pub bars: Vec<Bar>,
    pub daily: Option<DailyContext>,
}

/// A scored breakout, located in its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub pattern: Option<CombinationKey>,
    /// Why the classifier found nothing, when it didn't.
    pub no_pattern: Option<NoPattern>,
    pub result: ScoringResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    Evaluated {
        bars: usize,
        signals: Vec<SignalRecord>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: SessionId,
    pub daily_context: Option<DailyContext>,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    pub fn signals(&self) -> &[SignalRecord] {
        match &self.outcome {
            SessionOutcome::Evaluated { signals, .. } => signals,
            SessionOutcome::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Hash of the full run config (inputs included), when run from one.
    pub run_id: Option<ConfigHash>,
    pub config_hash: ConfigHash,
    pub sessions: Vec<SessionReport>,
    pub stats: FilterStatsSnapshot,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &SessionReport> {
        self.sessions.iter().filter(|s| s.is_failed())
    }

    pub fn signals(&self) -> impl Iterator<Item = (&SessionId, &SignalRecord)> {
        self.sessions
            .iter()
            .flat_map(|s| s.signals().iter().map(move |sig| (&s.session, sig)))
    }

    pub fn accepted(&self) -> impl Iterator<Item = (&SessionId, &SignalRecord)> {
        self.signals().filter(|(_, sig)| sig.result.is_accepted())
    }
}

/// Evaluates sessions against one pipeline config.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    evaluator: Evaluator,
    stats: Arc<FilterStats>,
    parallel: bool,
}

impl BatchRunner {
    pub fn new(config: PipelineConfig) -> Result<Self, RunError> {
        let stats = Arc::new(FilterStats::new());
        let evaluator = Evaluator::new(config)?.with_stats(Arc::clone(&stats));
        Ok(Self {
            evaluator,
            stats,
            parallel: true,
        })
    }

    pub fn with_table(mut self, table: Arc<CombinationTable>) -> Self {
        self.evaluator = self.evaluator.with_table(table);
        self
    }

    /// Enable or disable parallel evaluation.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn stats(&self) -> &Arc<FilterStats> {
        &self.stats
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate every session. Stats accumulate across calls until reset.
    pub fn run(&self, sessions: &[SessionInput]) -> Result<BatchReport, RunError> {
        let config_hash = self.evaluator.config_hash()?;

        let reports: Vec<SessionReport> = if self.parallel {
            sessions.par_iter().map(|s| self.run_session(s)).collect()
        } else {
            sessions.iter().map(|s| self.run_session(s)).collect()
        };

        let stats = self.stats.snapshot();
        let failed = reports.iter().filter(|r| r.is_failed()).count();
        info!(
            sessions = reports.len(),
            failed,
            checked = stats.checked,
            passed = stats.passed,
            blocked = stats.blocked,
            config_hash = %config_hash,
            "batch complete"
        );

        Ok(BatchReport {
            run_id: None,
            config_hash,
            sessions: reports,
            stats,
        })
    }

    fn run_session(&self, input: &SessionInput) -> SessionReport {
        let context = EvaluationContext { daily: input.daily };
        let outcome = match self.evaluator.evaluate(&input.bars, &context) {
            Ok(evaluation) => SessionOutcome::Evaluated {
                bars: input.bars.len(),
                signals: evaluation
                    .candidates
                    .into_iter()
                    .map(|c| {
                        let (pattern, no_pattern) = match c.pattern {
                            Ok(p) => (Some(p.combination_key()), None),
                            Err(reason) => (None, Some(reason)),
                        };
                        SignalRecord {
                            bar_index: c.breakout.bar_index,
                            timestamp: c.breakout.timestamp,
                            pattern,
                            no_pattern,
                            result: c.result,
                        }
                    })
                    .collect(),
            },
            Err(e) => {
                warn!(session = %input.session, error = %e, "session skipped");
                SessionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        SessionReport {
            session: input.session.clone(),
            daily_context: input.daily,
            outcome,
        }
    }
}

/// Load every input named by `config`, evaluate, and stamp the run id.
///
/// Daily context for a session comes from daily bars strictly before the
/// session date. History-derived adjustments override the configured table.
pub fn run_from_config(config: &RunConfig) -> Result<BatchReport, RunError> {
    let sessions = data_loader::load_session_bars(&config.inputs.bars)?;
    let daily = match &config.inputs.daily_bars {
        Some(path) => data_loader::load_daily_bars(path)?,
        None => Default::default(),
    };

    let mut table = config.pipeline.combination.table.clone();
    if let Some(path) = &config.inputs.history {
        let rows = data_loader::load_history(path)?;
        let derived = CombinationTable::from_history(&rows, &config.pipeline.combination.policy);
        info!(rows = rows.len(), entries = derived.len(), "history merged into combination table");
        table.merge(&derived);
    }

    let inputs: Vec<SessionInput> = sessions
        .into_iter()
        .map(|(session, bars)| {
            let context = daily.get(&session.symbol).and_then(|d| {
                DailyContext::from_daily_bars(data_loader::daily_before(d, session.date))
            });
            SessionInput {
                session,
                bars,
                daily: context,
            }
        })
        .collect();

    let runner = BatchRunner::new(config.pipeline.clone())?
        .with_table(Arc::new(table))
        .with_parallelism(config.parallel);
    let mut report = runner.run(&inputs)?;
    report.run_id = Some(config.run_id()?);
    Ok(report)
}
