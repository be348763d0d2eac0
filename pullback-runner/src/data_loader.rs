//! CSV adapters: intraday bars, daily bars and combination history.
//!
//! Intraday rows are grouped into sessions by (symbol, calendar date) and
//! sorted by timestamp. Duplicated or non-finite rows are left in place;
//! the evaluator rejects them per session so one bad session never sinks a
//! whole file.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use pullback_core::domain::{Bar, SessionId};
use pullback_core::scoring::CombinationHistory;
use pullback_core::stages::buckets::ParseKeyError;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognised timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: unrecognised date '{value}'")]
    Date { row: usize, value: String },

    #[error("row {row}: {source}")]
    Key {
        row: usize,
        #[source]
        source: ParseKeyError,
    },
}

/// Intraday bars keyed by session, each session in timestamp order.
pub type SessionBars = BTreeMap<SessionId, Vec<Bar>>;

/// Daily bars keyed by symbol, in date order.
pub type DailyBars = BTreeMap<String, Vec<Bar>>;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Intraday bars ──

#[derive(Debug, Deserialize)]
struct BarRow {
    symbol: String,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn read_session_bars<R: Read>(reader: R) -> Result<SessionBars, LoadError> {
    let mut sessions = SessionBars::new();
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    for (i, row) in rdr.deserialize::<BarRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        sessions
            .entry(SessionId::new(row.symbol, timestamp.date()))
            .or_default()
            .push(Bar {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
    }
    for bars in sessions.values_mut() {
        bars.sort_by_key(|b| b.timestamp);
    }
    debug!(sessions = sessions.len(), "intraday bars loaded");
    Ok(sessions)
}

pub fn load_session_bars(path: &Path) -> Result<SessionBars, LoadError> {
    read_session_bars(open(path)?)
}

// ── Daily bars ──

#[derive(Debug, Deserialize)]
struct DailyRow {
    symbol: String,
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn read_daily_bars<R: Read>(reader: R) -> Result<DailyBars, LoadError> {
    let mut daily = DailyBars::new();
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    for (i, row) in rdr.deserialize::<DailyRow>().enumerate() {
        let row = row?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
            LoadError::Date {
                row: i + 1,
                value: row.date.clone(),
            }
        })?;
        daily.entry(row.symbol).or_default().push(Bar {
            timestamp: date.and_time(chrono::NaiveTime::MIN),
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    for bars in daily.values_mut() {
        bars.sort_by_key(|b| b.timestamp);
    }
    Ok(daily)
}

pub fn load_daily_bars(path: &Path) -> Result<DailyBars, LoadError> {
    read_daily_bars(open(path)?)
}

/// Daily bars strictly before `date`: the context a session may see.
pub fn daily_before(bars: &[Bar], date: NaiveDate) -> &[Bar] {
    let end = bars.partition_point(|b| b.timestamp.date() < date);
    &bars[..end]
}

// ── Combination history ──

#[derive(Debug, Deserialize)]
struct HistoryRow {
    uptrend: String,
    decline: String,
    support: String,
    #[serde(default)]
    breakout: Option<String>,
    trades: u32,
    wins: u32,
    net_profit_pct: f64,
}

pub fn read_history<R: Read>(reader: R) -> Result<Vec<CombinationHistory>, LoadError> {
    let mut rows = Vec::new();
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    for (i, row) in rdr.deserialize::<HistoryRow>().enumerate() {
        let row = row?;
        let mut text = format!("{}+{}+{}", row.uptrend, row.decline, row.support);
        if let Some(b) = row.breakout.as_deref().filter(|b| !b.is_empty()) {
            text.push('+');
            text.push_str(b);
        }
        let key = text
            .parse()
            .map_err(|source| LoadError::Key { row: i + 1, source })?;
        rows.push(CombinationHistory {
            key,
            trades: row.trades,
            wins: row.wins,
            net_profit_pct: row.net_profit_pct,
        });
    }
    Ok(rows)
}

pub fn load_history(path: &Path) -> Result<Vec<CombinationHistory>, LoadError> {
    read_history(open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pullback_core::stages::buckets::CandleDirection;

    const BARS: &str = "\
symbol,timestamp,open,high,low,close,volume
AAA,2024-03-04 09:01:00,10,11,9.5,10.5,1000
AAA,2024-03-04 09:00:00,10,10.2,9.8,10,900
BBB,2024-03-04T09:00:00,20,21,19,20.5,500
AAA,2024-03-05 09:00,10.5,10.7,10.1,10.6,800
";

    #[test]
    fn bars_grouped_by_symbol_and_date() {
        let sessions = read_session_bars(BARS.as_bytes()).unwrap();
        let keys: Vec<String> = sessions.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["AAA@2024-03-04", "AAA@2024-03-05", "BBB@2024-03-04"]);

        let first = sessions.values().next().unwrap();
        assert_eq!(first.len(), 2);
        // sorted within the session
        assert!(first[0].timestamp < first[1].timestamp);
        assert_eq!(first[0].close, 10.0);
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let csv = "symbol,timestamp,open,high,low,close,volume\nAAA,yesterday,1,1,1,1,1\n";
        match read_session_bars(csv.as_bytes()) {
            Err(LoadError::Timestamp { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_price_is_csv_error() {
        let csv = "symbol,timestamp,open,high,low,close,volume\nAAA,2024-03-04 09:00:00,x,1,1,1,1\n";
        assert!(matches!(read_session_bars(csv.as_bytes()), Err(LoadError::Csv(_))));
    }

    #[test]
    fn daily_before_excludes_session_day() {
        let csv = "\
symbol,date,open,high,low,close,volume
AAA,2024-03-05,1,1,1,1,1
AAA,2024-03-01,1,1,1,1,1
AAA,2024-03-04,1,1,1,1,1
";
        let daily = read_daily_bars(csv.as_bytes()).unwrap();
        let bars = &daily["AAA"];
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let prior = daily_before(bars, date);
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].timestamp.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn history_with_and_without_breakout_column() {
        let csv = "\
uptrend,decline,support,breakout,trades,wins,net_profit_pct
weak,deep,short,,20,1,-12.5
strong,shallow,short,bullish,15,12,6.0
";
        let rows = read_history(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key.to_string(), "weak+deep+short");
        assert_eq!(rows[1].key.breakout, Some(CandleDirection::Bullish));

        let csv = "uptrend,decline,support,trades,wins,net_profit_pct\nmoderate,moderate,short,12,2,-4\n";
        let rows = read_history(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].key.to_string(), "moderate+moderate+short");
    }

    #[test]
    fn unknown_bucket_is_key_error() {
        let csv = "uptrend,decline,support,trades,wins,net_profit_pct\nhuge,deep,short,1,1,1\n";
        assert!(matches!(
            read_history(csv.as_bytes()),
            Err(LoadError::Key { row: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_session_bars(Path::new("/nonexistent/bars.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
