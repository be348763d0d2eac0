//! Scorer: runs a candidate through the detection, combination and
//! confidence gates and produces a [`ScoringResult`].
//!
//! Every gate is evaluated regardless of the others so the record always
//! carries all three outcomes.

use std::sync::Arc;

use tracing::debug;

use super::combination::{CombinationConfig, CombinationScore, CombinationTable};
use super::daily::DailyContext;
use super::decision::{Candidate, Decision, Detection, Gate, GateOutcome, ScoringResult};
use super::gate::GateConfig;
use super::stats::FilterStats;

#[derive(Debug, Clone)]
pub struct Scorer {
    table: Arc<CombinationTable>,
    floor: f64,
    gate: GateConfig,
    stats: Option<Arc<FilterStats>>,
}

impl Scorer {
    pub fn new(combination: &CombinationConfig, gate: GateConfig) -> Self {
        Self {
            table: Arc::new(combination.table.clone()),
            floor: combination.floor,
            gate,
            stats: None,
        }
    }

    /// Use a shared table instead of the configured one.
    pub fn with_table(mut self, table: Arc<CombinationTable>) -> Self {
        self.table = table;
        self
    }

    pub fn with_stats(mut self, stats: Arc<FilterStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn table(&self) -> &Arc<CombinationTable> {
        &self.table
    }

    pub fn gate_config(&self) -> &GateConfig {
        &self.gate
    }

    pub fn stats(&self) -> Option<&Arc<FilterStats>> {
        self.stats.as_ref()
    }

    /// Score one candidate. Missing daily context falls back to the gate's
    /// configured default.
    pub fn score(&self, candidate: &Candidate, daily: Option<DailyContext>) -> ScoringResult {
        let (key, base, detection) = match &candidate.detection {
            Detection::Pattern {
                key,
                base_confidence,
            } => (
                Some(*key),
                *base_confidence,
                GateOutcome::new(Gate::Detection, true, format!("pattern {key}"))
                    .with_value("base_confidence", *base_confidence),
            ),
            Detection::Missing { reason } => (
                None,
                0.0,
                GateOutcome::new(Gate::Detection, false, reason.clone()),
            ),
        };

        let combination = match &key {
            Some(k) => self.table.score(k),
            None => CombinationScore {
                adjustment: 0,
                matched: None,
                reason: "no combination".into(),
            },
        };
        let adjusted = base + f64::from(combination.adjustment);
        let combination_ok = adjusted > self.floor;
        let combination_gate = GateOutcome::new(
            Gate::Combination,
            combination_ok,
            combination.reason.clone(),
        )
        .with_value("adjustment", f64::from(combination.adjustment))
        .with_value("adjusted_confidence", adjusted)
        .with_value("floor", self.floor);
        if combination.adjustment != 0 {
            debug!(
                key = ?key.map(|k| k.to_string()),
                adjustment = combination.adjustment,
                adjusted,
                "combination adjustment applied"
            );
        }

        let used_default_context = daily.is_none();
        let context = daily.unwrap_or(self.gate.missing_context);
        let requirement = self.gate.requirement(candidate.hour, &context);
        let confidence_ok = adjusted >= requirement.required;
        let confidence_gate = GateOutcome::new(
            Gate::Confidence,
            confidence_ok,
            format!(
                "{adjusted:.1} vs {:.1} required ({} window)",
                requirement.required, requirement.window
            ),
        )
        .with_value("adjusted_confidence", adjusted)
        .with_value("required", requirement.required)
        .with_value("hour", f64::from(candidate.hour))
        .with_value("daily_strength", context.strength)
        .with_value("daily_ideal", if context.ideal { 1.0 } else { 0.0 });

        let gates = vec![detection, combination_gate, confidence_gate];
        let blocked: Vec<Gate> = gates.iter().filter(|g| !g.passed).map(|g| g.gate).collect();
        let (decision, reason) = if blocked.is_empty() {
            (
                Decision::Accepted,
                format!(
                    "accepted: {adjusted:.1} >= {:.1} ({})",
                    requirement.required, requirement.window
                ),
            )
        } else {
            let why: Vec<String> = gates
                .iter()
                .filter(|g| !g.passed)
                .map(|g| format!("{}: {}", g.gate, g.reason))
                .collect();
            debug!(
                hour = candidate.hour,
                adjusted,
                required = requirement.required,
                gates = ?blocked,
                "candidate blocked"
            );
            (
                Decision::Blocked { gates: blocked },
                format!("blocked by {}", why.join("; ")),
            )
        };

        let result = ScoringResult {
            base_confidence: base,
            bonus_or_penalty: combination.adjustment,
            adjusted_confidence: adjusted,
            decision,
            reason,
            key,
            matched_key: combination.matched,
            hour: candidate.hour,
            window: requirement.window,
            daily_context: context,
            used_default_context,
            required_confidence: requirement.required,
            entry_price: candidate.entry_price,
            gates,
        };
        if let Some(stats) = &self.stats {
            stats.record(&result);
        }
        result
    }
}
