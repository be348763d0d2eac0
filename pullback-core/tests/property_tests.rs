//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Bucketing is total and monotone
//! 2. Consolidation streaks step by exactly one or reset to zero
//! 3. Breakout zones never include the breakout bar
//! 4. Gate and filter stats bookkeeping is consistent

use chrono::NaiveDate;
use proptest::prelude::*;
use std::sync::Arc;

use pullback_core::detection::{BreakoutTrigger, ConsolidationConfig, ConsolidationDetector};
use pullback_core::domain::Bar;
use pullback_core::features::{FeatureConfig, FeatureEngine};
use pullback_core::scoring::{
    Candidate, CombinationConfig, DailyContext, DailyStrength, FilterStats, GateConfig, Scorer,
};
use pullback_core::stages::{
    parse_magnitude, CombinationKey, DeclineDepth, SupportLength, UptrendStrength,
};
use pullback_core::{EvaluationContext, Evaluator, PipelineConfig};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_magnitude() -> impl Strategy<Value = f64> {
    prop_oneof![
        -20.0..20.0_f64,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(4.0),
        Just(6.0),
        Just(1.5),
        Just(2.5),
    ]
}

/// (close change, wick, volume) per bar; quiet stretches are likely.
fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (
            prop_oneof![3 => -0.02..0.02_f64, 1 => -1.5..1.5_f64],
            0.0..0.3_f64,
            100.0..2000.0_f64,
        ),
        30..120,
    )
    .prop_map(|steps| {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut price = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (change, wick, volume))| {
                let open = price;
                price = (price + change).max(1.0);
                Bar {
                    timestamp: start + chrono::Duration::minutes(i as i64),
                    open,
                    high: open.max(price) + wick,
                    low: open.min(price) - wick,
                    close: price,
                    volume,
                }
            })
            .collect()
    })
}

fn permissive_consolidation() -> ConsolidationConfig {
    ConsolidationConfig {
        atr_quantile: 0.9,
        bandwidth_max: 0.05,
        range_pct_max: 0.02,
        ma_slope_max: 0.002,
        volume_ratio_max: 1.5,
        ..ConsolidationConfig::default()
    }
}

// ── 1. Bucketing ─────────────────────────────────────────────────────

proptest! {
    /// Any magnitude, including NaN and infinities, lands in a bucket.
    #[test]
    fn bucketing_is_total(g in arb_magnitude(), d in arb_magnitude(), s in arb_magnitude()) {
        let key = CombinationKey::from_magnitudes(g, d, s);
        let text = key.to_string();
        prop_assert_eq!(text.split('+').count(), 3);
    }

    /// Larger magnitudes never land in a lower bucket.
    #[test]
    fn bucketing_is_monotone(a in -10.0..20.0_f64, b in -10.0..20.0_f64) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(UptrendStrength::from_gain_pct(lo) <= UptrendStrength::from_gain_pct(hi));
        prop_assert!(DeclineDepth::from_decline_pct(lo) <= DeclineDepth::from_decline_pct(hi));
        prop_assert!(SupportLength::from_candles(lo) <= SupportLength::from_candles(hi));
    }

    /// Parsing arbitrary text never fails and never yields a non-finite value.
    #[test]
    fn magnitude_parsing_is_total(text in "\\PC{0,12}") {
        prop_assert!(parse_magnitude(&text).is_finite());
    }
}

// ── 2. Consolidation streaks ─────────────────────────────────────────

proptest! {
    #[test]
    fn streak_steps_by_one_or_resets(bars in arb_bars()) {
        let features = FeatureEngine::new(FeatureConfig::default()).compute(&bars);
        let states = ConsolidationDetector::new(permissive_consolidation()).detect(&bars, &features);
        prop_assert_eq!(states.len(), bars.len());

        let mut prev = 0usize;
        for s in &states {
            if s.consolidated {
                prop_assert_eq!(s.streak_length, prev + 1);
            } else {
                prop_assert_eq!(s.streak_length, 0);
            }
            if let Some(z) = s.zone {
                prop_assert!(z.low <= z.high);
            }
            prev = s.streak_length;
        }
    }
}

// ── 3. Breakout zones ────────────────────────────────────────────────

proptest! {
    #[test]
    fn breakout_zone_precedes_bar(bars in arb_bars()) {
        let features = FeatureEngine::new(FeatureConfig::default()).compute(&bars);
        let detector = ConsolidationDetector::new(permissive_consolidation());
        let states = detector.detect(&bars, &features);
        let trigger = BreakoutTrigger::new(Default::default());
        for e in trigger.scan(&bars, &features, &states) {
            prop_assert!(e.zone_reference.end_index < e.bar_index);
            let prev = &states[e.bar_index - 1];
            prop_assert!(prev.consolidated);
            prop_assert!(prev.streak_length >= trigger.config().min_persist_bars);
            let bar = &bars[e.bar_index];
            prop_assert!(e.entry_price >= bar.low && e.entry_price <= bar.high);
        }
    }
}

// ── 4. Gate and stats ────────────────────────────────────────────────

proptest! {
    #[test]
    fn daily_strength_is_bounded(p in -50.0..50.0_f64, v in -100.0..200.0_f64, m in -20.0..20.0_f64) {
        let s = DailyStrength::score(p, v, m);
        prop_assert!((0.0..=100.0).contains(&s.strength));
        prop_assert_eq!(s.ideal, p > 2.0 && v < -10.0 && m > 0.0);
    }

    /// Acceptance is exactly: every gate passed.
    #[test]
    fn decision_matches_gates(
        g in 0.0..12.0_f64,
        d in 0.0..4.0_f64,
        s in 1.0..8.0_f64,
        base in 60.0..100.0_f64,
        hour in 8u32..16,
        strength in 0.0..100.0_f64,
        ideal in any::<bool>(),
    ) {
        let scorer = Scorer::new(&CombinationConfig::default(), GateConfig::default());
        let key = CombinationKey::from_magnitudes(g, d, s.floor());
        let r = scorer.score(
            &Candidate::pattern(hour, 100.0, key, base),
            Some(DailyContext::new(strength, ideal)),
        );
        let all_passed = r.gates.iter().all(|g| g.passed);
        prop_assert_eq!(r.is_accepted(), all_passed);
        prop_assert_eq!(
            r.gate(pullback_core::scoring::Gate::Confidence).unwrap().passed,
            r.adjusted_confidence >= r.required_confidence
        );
        prop_assert_eq!(r.adjusted_confidence, base + f64::from(r.bonus_or_penalty));
    }

    /// Filter stats count every scored candidate exactly once.
    #[test]
    fn stats_total_matches_candidates(bars in arb_bars()) {
        let stats = Arc::new(FilterStats::new());
        let mut config = PipelineConfig::default();
        config.consolidation = permissive_consolidation();
        let evaluator = Evaluator::new(config).unwrap().with_stats(Arc::clone(&stats));
        let eval = evaluator.evaluate(&bars, &EvaluationContext::default()).unwrap();

        let snap = stats.snapshot();
        prop_assert_eq!(snap.checked as usize, eval.candidates.len());
        prop_assert_eq!(snap.passed + snap.blocked, snap.checked);
        prop_assert_eq!(snap.passed as usize, eval.accepted().count());
    }
}
