//! Property tests for the CSV adapters.

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use pullback_runner::data_loader::{daily_before, read_daily_bars, read_session_bars};

// ── Strategies (proptest) ────────────────────────────────────────────

/// (symbol, day offset, minute offset) rows in arbitrary order.
fn arb_rows() -> impl Strategy<Value = Vec<(usize, i64, i64)>> {
    prop::collection::vec((0usize..3, 0i64..4, 0i64..390), 0..80)
}

const SYMBOLS: [&str; 3] = ["AAA", "BBB", "CCC"];

fn to_csv(rows: &[(usize, i64, i64)]) -> String {
    let open = NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let mut csv = String::from("symbol,timestamp,open,high,low,close,volume\n");
    for (sym, day, minute) in rows {
        let ts = open + Duration::days(*day) + Duration::minutes(*minute);
        writeln!(csv, "{},{},1,2,0.5,1.5,100", SYMBOLS[*sym], ts.format("%Y-%m-%d %H:%M:%S"))
            .unwrap();
    }
    csv
}

proptest! {
    #[test]
    fn grouping_keeps_every_row(rows in arb_rows()) {
        let sessions = read_session_bars(to_csv(&rows).as_bytes()).unwrap();
        let total: usize = sessions.values().map(Vec::len).sum();
        prop_assert_eq!(total, rows.len());
    }

    #[test]
    fn sessions_hold_one_date_in_order(rows in arb_rows()) {
        let sessions = read_session_bars(to_csv(&rows).as_bytes()).unwrap();
        for (id, bars) in &sessions {
            prop_assert!(bars.iter().all(|b| b.timestamp.date() == id.date));
            prop_assert!(bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }

    #[test]
    fn daily_context_never_sees_session_day(days in prop::collection::vec(0i64..30, 1..40), cut in 0i64..30) {
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut csv = String::from("symbol,date,open,high,low,close,volume\n");
        for d in &days {
            writeln!(csv, "AAA,{},1,1,1,1,1", first + Duration::days(*d)).unwrap();
        }
        let daily = read_daily_bars(csv.as_bytes()).unwrap();
        let date = first + Duration::days(cut);
        let prior = daily_before(&daily["AAA"], date);
        prop_assert!(prior.iter().all(|b| b.timestamp.date() < date));
        prop_assert_eq!(prior.len(), days.iter().filter(|d| **d < cut).count());
    }
}
