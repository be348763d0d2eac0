//! End-to-end scenarios: classification, combination scoring and the gate.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use pullback_core::domain::Bar;
use pullback_core::scoring::{
    AdjustmentPolicy, Candidate, CombinationHistory, CombinationTable, DailyContext, Decision,
    Gate, GateConfig,
};
use pullback_core::stages::{
    CandleDirection, ClassifierConfig, CombinationKey, DeclineDepth, MagnitudeRecord,
    PatternClassifier, SupportLength, UptrendStrength,
};
use pullback_core::{EvaluationContext, Evaluator, PipelineConfig};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

/// Uptrend 0..=3, decline 4..=5, support 6..=7, breakout 8; three-minute bars.
fn pullback_bars(start: NaiveDateTime) -> Vec<Bar> {
    let candles = [
        (99.5, 100.2, 99.4, 100.0, 4000.0),
        (100.0, 102.2, 99.9, 102.0, 6000.0),
        (102.0, 104.2, 101.9, 104.0, 8000.0),
        (104.0, 107.0, 103.9, 106.5, 10000.0),
        (106.5, 106.6, 105.3, 105.5, 5000.0),
        (105.5, 105.6, 105.0, 105.2, 3000.0),
        (105.6, 105.7, 105.1, 105.2, 2000.0),
        (105.25, 105.35, 105.15, 105.25, 1500.0),
        (105.3, 105.7, 105.25, 105.65, 2500.0),
    ];
    candles
        .iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Bar {
            timestamp: start + chrono::Duration::minutes(3 * i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// One-minute session from 09:00 whose bar 50 is an accepted pullback breakout.
///
/// Bars 0..=29 drift flat on 3000 volume, bars 30..=31 rally 100 -> 103.125
/// on 10000, bars 32..=49 rest at 101.625 on 1000 with a small body, and
/// bar 50 breaks out on 2000. Prices sit on eighths so every ATR is exact.
fn accepted_session() -> Vec<Bar> {
    let quiet = |volume| (101.5625, 101.75, 101.5, 101.625, volume);
    let mut candles: Vec<(f64, f64, f64, f64, f64)> = vec![quiet(3000.0); 30];
    candles.push((101.625, 101.625, 99.875, 100.0, 10000.0));
    candles.push((100.0, 103.25, 100.0, 103.125, 10000.0));
    candles.extend(std::iter::repeat(quiet(1000.0)).take(18));
    candles.push((101.625, 102.0, 101.625, 101.9375, 2000.0));
    candles
        .iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Bar {
            timestamp: at(9, 0) + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

fn evaluator_with(table: CombinationTable) -> Evaluator {
    Evaluator::new(PipelineConfig::default())
        .unwrap()
        .with_table(Arc::new(table))
}

#[test]
fn logged_strong_shallow_short_at_open_is_accepted() {
    let record = MagnitudeRecord {
        uptrend_gain: "6.5%".into(),
        decline_pct: "1.2%".into(),
        support_candles: "2".into(),
    };
    let key = record.combination_key();
    assert_eq!(
        key,
        CombinationKey::new(
            UptrendStrength::Strong,
            DeclineDepth::Shallow,
            SupportLength::Short
        )
    );

    let mut table = CombinationTable::new();
    table.insert(key, 5, "strong history");
    let evaluator = evaluator_with(table);

    let candle = at(9, 5);
    let result = evaluator.score(
        &Candidate::pattern(candle.hour(), 105.0, key, 72.0),
        Some(DailyContext::new(80.0, false)),
    );
    assert_eq!(result.bonus_or_penalty, 5);
    assert_eq!(result.adjusted_confidence, 77.0);
    assert_eq!(result.required_confidence, 65.0);
    assert_eq!(result.decision, Decision::Accepted);
    assert_eq!(result.window, "opening");
}

#[test]
fn gate_reference_points() {
    let gate = GateConfig::default();
    assert_eq!(gate.required(13, 50.0, false), 95.0);
    assert_eq!(gate.required(9, 75.0, false), 65.0);
    assert_eq!(gate.required(9, 75.0, true), 65.0);
    assert_eq!(gate.required(11, 75.0, true), 70.0);
}

#[test]
fn classified_pattern_flows_into_scoring() {
    let bars = pullback_bars(at(9, 5));
    let pattern = PatternClassifier::new(ClassifierConfig::default())
        .classify(&bars)
        .unwrap();
    let key = pattern.combination_key();
    assert_eq!(key.breakout, Some(CandleDirection::Bullish));
    assert_eq!(key.stages_only().to_string(), "strong+shallow+short");

    let evaluator = Evaluator::new(PipelineConfig::default()).unwrap();
    let candle = &bars[pattern.breakout.bar_index];
    let result = evaluator.score(
        &Candidate::pattern(candle.hour(), pattern.entry_price, key, pattern.confidence),
        Some(DailyContext::new(80.0, false)),
    );
    assert!(result.is_accepted());
    assert_eq!(result.base_confidence, 95.0);
    assert_eq!(result.bonus_or_penalty, 0);
    assert_eq!(result.matched_key, None);
}

#[test]
fn same_pattern_at_midday_on_weak_day_needs_95() {
    let bars = pullback_bars(at(13, 0));
    let pattern = PatternClassifier::new(ClassifierConfig::default())
        .classify(&bars)
        .unwrap();
    let key = pattern.combination_key();

    let mut table = CombinationTable::new();
    table.insert(key.stages_only(), -1, "slightly negative");
    let evaluator = evaluator_with(table);

    let result = evaluator.score(
        &Candidate::pattern(13, pattern.entry_price, key, pattern.confidence),
        Some(DailyContext::new(50.0, false)),
    );
    assert_eq!(result.required_confidence, 95.0);
    assert_eq!(result.adjusted_confidence, 94.0);
    assert_eq!(
        result.decision,
        Decision::Blocked {
            gates: vec![Gate::Confidence]
        }
    );
}

#[test]
fn history_derived_penalty_blocks_at_floor() {
    let rows = vec![CombinationHistory {
        key: "strong+shallow+short".parse().unwrap(),
        trades: 40,
        wins: 2,
        net_profit_pct: -18.0,
    }];
    let table = CombinationTable::from_history(&rows, &AdjustmentPolicy::default());
    let evaluator = evaluator_with(table);

    let key = CombinationKey::from_magnitudes(6.5, 1.2, 2.0).with_breakout(CandleDirection::Bullish);
    let result = evaluator.score(&Candidate::pattern(10, 100.0, key, 50.0), None);
    assert_eq!(result.bonus_or_penalty, -50);
    assert_eq!(result.adjusted_confidence, 0.0);
    assert!(result.decision.blocked_by(Gate::Combination));
    assert!(result.decision.blocked_by(Gate::Confidence));
    assert!(result.used_default_context);
}

#[test]
fn session_breakout_with_stage_pattern_is_accepted() {
    let bars = accepted_session();
    let mut table = CombinationTable::reference();
    table.insert("weak+shallow+short".parse().unwrap(), 3, "steady winner");
    let ctx = EvaluationContext::with_daily(DailyContext::new(80.0, false));
    let eval = evaluator_with(table).evaluate(&bars, &ctx).unwrap();

    assert_eq!(eval.consolidation[49].streak_length, 4);
    assert_eq!(eval.candidates.len(), 1);
    let c = &eval.candidates[0];
    assert_eq!(c.breakout.bar_index, 50);
    assert!((c.breakout.entry_price - 101.8125).abs() < 1e-9);

    let pattern = c.pattern.as_ref().unwrap();
    assert_eq!(pattern.uptrend.segment.start_index, 30);
    assert_eq!(pattern.uptrend.segment.end_index, 31);
    assert_eq!(pattern.support.segment.candle_count, 1);
    assert_eq!(pattern.confidence, 97.0);
    assert_eq!(pattern.combination_key().to_string(), "weak+shallow+short+bullish");

    let r = &c.result;
    assert_eq!(r.decision, Decision::Accepted);
    assert_eq!(r.key, Some(pattern.combination_key()));
    assert_eq!(r.matched_key, Some("weak+shallow+short".parse().unwrap()));
    assert_eq!(r.base_confidence, 97.0);
    assert_eq!(r.bonus_or_penalty, 3);
    assert_eq!(r.adjusted_confidence, 100.0);
    assert_eq!(r.window, "opening");
    assert_eq!(r.required_confidence, 65.0);
    assert_eq!(eval.accepted().count(), 1);
}

#[test]
fn rerun_on_frozen_input_is_identical() {
    let bars = accepted_session();
    let evaluator = Evaluator::new(PipelineConfig::default()).unwrap();
    let ctx = EvaluationContext::with_daily(DailyContext::new(80.0, false));
    let a = evaluator.evaluate(&bars, &ctx).unwrap();
    let b = evaluator.evaluate(&bars, &ctx).unwrap();
    assert_eq!(a.accepted().count(), 1);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
