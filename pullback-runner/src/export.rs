//! Report export: pretty JSON for audit, flat CSV for spreadsheets.

use std::path::Path;

use pullback_core::scoring::Decision;

use crate::batch::{BatchReport, RunError};

pub fn export_json(report: &BatchReport) -> Result<String, RunError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn import_json(json: &str) -> Result<BatchReport, RunError> {
    Ok(serde_json::from_str(json)?)
}

/// One row per scored breakout.
///
/// Columns: session, timestamp, bar_index, key, base_confidence,
/// bonus_or_penalty, adjusted_confidence, required_confidence, window,
/// status, blocked_by, reason
pub fn export_signals_csv(report: &BatchReport) -> Result<String, RunError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "session",
        "timestamp",
        "bar_index",
        "key",
        "base_confidence",
        "bonus_or_penalty",
        "adjusted_confidence",
        "required_confidence",
        "window",
        "status",
        "blocked_by",
        "reason",
    ])?;

    for (session, sig) in report.signals() {
        let r = &sig.result;
        let (status, blocked_by) = match &r.decision {
            Decision::Accepted => ("accepted".to_string(), String::new()),
            Decision::Blocked { gates } => (
                "blocked".to_string(),
                gates.iter().map(|g| g.to_string()).collect::<Vec<_>>().join("|"),
            ),
        };
        wtr.write_record([
            &session.to_string(),
            &sig.timestamp.to_string(),
            &sig.bar_index.to_string(),
            &r.key.map(|k| k.to_string()).unwrap_or_default(),
            &format!("{:.1}", r.base_confidence),
            &r.bonus_or_penalty.to_string(),
            &format!("{:.1}", r.adjusted_confidence),
            &format!("{:.1}", r.required_confidence),
            &r.window,
            &status,
            &blocked_by,
            &r.reason,
        ])?;
    }

    let data = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

pub fn write_report(report: &BatchReport, dir: &Path) -> Result<(), RunError> {
    let write = |name: &str, content: String| {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|source| RunError::Io { path, source })
    };
    std::fs::create_dir_all(dir).map_err(|source| RunError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    write("report.json", export_json(report)?)?;
    write("signals.csv", export_signals_csv(report)?)?;
    Ok(())
}
