//! Bar: the fundamental market data unit.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intraday OHLCV bar for a single instrument.
///
/// `timestamp` is the exchange-local wall clock of the bar open; the
/// confidence gate reads its hour. Volume is fractional to accommodate
/// vendors that report adjusted volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Which OHLCV field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl std::fmt::Display for BarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
        };
        f.write_str(s)
    }
}

/// Invalid bar input. Fatal for the bar sequence that contains it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index}: {field} is not a finite number")]
    NonNumeric { index: usize, field: BarField },

    #[error("bar {index}: timestamp {timestamp} does not follow {previous}")]
    OutOfOrder {
        index: usize,
        previous: NaiveDateTime,
        timestamp: NaiveDateTime,
    },
}

impl Bar {
    /// Body size |close - open|.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full candle range high - low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Midpoint of the candle body.
    pub fn body_midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    /// Hour of day (0-23) of the bar timestamp.
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// First field that is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<BarField> {
        [
            (BarField::Open, self.open),
            (BarField::High, self.high),
            (BarField::Low, self.low),
            (BarField::Close, self.close),
            (BarField::Volume, self.volume),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(field, _)| field)
    }
}

/// Check that every bar is finite and timestamps strictly increase.
///
/// Gaps between timestamps are allowed.
pub fn validate_bars(bars: &[Bar]) -> Result<(), BarError> {
    for (index, bar) in bars.iter().enumerate() {
        if let Some(field) = bar.first_non_finite() {
            return Err(BarError::NonNumeric { index, field });
        }
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(BarError::OutOfOrder {
                    index,
                    previous,
                    timestamp: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}
