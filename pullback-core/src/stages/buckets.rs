//! Stage magnitude buckets and the combination key built from them.
//!
//! | stage    | bucket   | rule (percent units)   |
//! |----------|----------|------------------------|
//! | uptrend  | weak     | gain < 4               |
//! |          | moderate | 4 <= gain < 6          |
//! |          | strong   | gain >= 6              |
//! | decline  | shallow  | depth < 1.5            |
//! |          | moderate | 1.5 <= depth < 2.5     |
//! |          | deep     | depth >= 2.5           |
//! | support  | short    | candles <= 2           |
//! |          | moderate | 3 <= candles <= 4      |
//! |          | long     | candles > 4            |
//!
//! Bucketing is total: NaN and negative magnitudes land in the lowest bucket.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UptrendStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineDepth {
    Shallow,
    Moderate,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLength {
    Short,
    Moderate,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleDirection {
    Bullish,
    Bearish,
}

impl UptrendStrength {
    pub fn from_gain_pct(gain_pct: f64) -> Self {
        if gain_pct >= 6.0 {
            Self::Strong
        } else if gain_pct >= 4.0 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

impl DeclineDepth {
    pub fn from_decline_pct(decline_pct: f64) -> Self {
        if decline_pct >= 2.5 {
            Self::Deep
        } else if decline_pct >= 1.5 {
            Self::Moderate
        } else {
            Self::Shallow
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Moderate => "moderate",
            Self::Deep => "deep",
        }
    }
}

impl SupportLength {
    /// Fractional counts (from parsed text) are compared as-is.
    pub fn from_candles(candles: f64) -> Self {
        if candles > 4.0 {
            Self::Long
        } else if candles > 2.0 {
            Self::Moderate
        } else {
            Self::Short
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Moderate => "moderate",
            Self::Long => "long",
        }
    }
}

impl CandleDirection {
    pub fn of(open: f64, close: f64) -> Self {
        if close > open {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
        }
    }
}

/// Structural fingerprint of a pattern.
///
/// Ordering is uptrend, decline, support, then the optional breakout
/// direction. Text form: `strong+shallow+short` or `strong+shallow+short+bullish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombinationKey {
    pub uptrend: UptrendStrength,
    pub decline: DeclineDepth,
    pub support: SupportLength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakout: Option<CandleDirection>,
}

impl CombinationKey {
    pub fn new(uptrend: UptrendStrength, decline: DeclineDepth, support: SupportLength) -> Self {
        Self {
            uptrend,
            decline,
            support,
            breakout: None,
        }
    }

    pub fn with_breakout(mut self, direction: CandleDirection) -> Self {
        self.breakout = Some(direction);
        self
    }

    /// Bucket raw magnitudes (percent units, candle count).
    pub fn from_magnitudes(gain_pct: f64, decline_pct: f64, support_candles: f64) -> Self {
        Self::new(
            UptrendStrength::from_gain_pct(gain_pct),
            DeclineDepth::from_decline_pct(decline_pct),
            SupportLength::from_candles(support_candles),
        )
    }

    /// The three-stage key with the breakout dimension dropped.
    pub fn stages_only(&self) -> Self {
        Self {
            breakout: None,
            ..*self
        }
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}+{}+{}",
            self.uptrend.as_str(),
            self.decline.as_str(),
            self.support.as_str()
        )?;
        if let Some(direction) = self.breakout {
            write!(f, "+{}", direction.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid combination key '{0}': expected uptrend+decline+support[+breakout]")]
pub struct ParseKeyError(pub String);

impl FromStr for CombinationKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let parts: Vec<String> = s.split('+').map(|p| p.trim().to_ascii_lowercase()).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(err());
        }
        let uptrend = match parts[0].as_str() {
            "weak" => UptrendStrength::Weak,
            "moderate" => UptrendStrength::Moderate,
            "strong" => UptrendStrength::Strong,
            _ => return Err(err()),
        };
        let decline = match parts[1].as_str() {
            "shallow" => DeclineDepth::Shallow,
            "moderate" => DeclineDepth::Moderate,
            "deep" => DeclineDepth::Deep,
            _ => return Err(err()),
        };
        let support = match parts[2].as_str() {
            "short" => SupportLength::Short,
            "moderate" => SupportLength::Moderate,
            "long" => SupportLength::Long,
            _ => return Err(err()),
        };
        let breakout = match parts.get(3).map(String::as_str) {
            None => None,
            Some("bullish") => Some(CandleDirection::Bullish),
            Some("bearish") => Some(CandleDirection::Bearish),
            Some(_) => return Err(err()),
        };
        Ok(Self {
            uptrend,
            decline,
            support,
            breakout,
        })
    }
}

/// Parse a magnitude written as text by external logs ("5.70%", "1,234", " 2 ").
///
/// Strips `%`, thousands separators and whitespace. Anything unparsable
/// yields 0.0, which buckets into the lowest category.
pub fn parse_magnitude(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '%' && *c != ',' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// String-encoded stage magnitudes as they appear in signal logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnitudeRecord {
    pub uptrend_gain: String,
    pub decline_pct: String,
    pub support_candles: String,
}

impl MagnitudeRecord {
    pub fn combination_key(&self) -> CombinationKey {
        CombinationKey::from_magnitudes(
            parse_magnitude(&self.uptrend_gain),
            parse_magnitude(&self.decline_pct),
            parse_magnitude(&self.support_candles),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptrend_thresholds_exact() {
        assert_eq!(UptrendStrength::from_gain_pct(3.99), UptrendStrength::Weak);
        assert_eq!(UptrendStrength::from_gain_pct(4.0), UptrendStrength::Moderate);
        assert_eq!(UptrendStrength::from_gain_pct(5.99), UptrendStrength::Moderate);
        assert_eq!(UptrendStrength::from_gain_pct(6.0), UptrendStrength::Strong);
    }

    #[test]
    fn decline_thresholds_exact() {
        assert_eq!(DeclineDepth::from_decline_pct(1.49), DeclineDepth::Shallow);
        assert_eq!(DeclineDepth::from_decline_pct(1.5), DeclineDepth::Moderate);
        assert_eq!(DeclineDepth::from_decline_pct(2.5), DeclineDepth::Deep);
    }

    #[test]
    fn support_thresholds_exact() {
        assert_eq!(SupportLength::from_candles(2.0), SupportLength::Short);
        assert_eq!(SupportLength::from_candles(3.0), SupportLength::Moderate);
        assert_eq!(SupportLength::from_candles(4.0), SupportLength::Moderate);
        assert_eq!(SupportLength::from_candles(5.0), SupportLength::Long);
    }

    #[test]
    fn nan_buckets_lowest() {
        let key = CombinationKey::from_magnitudes(f64::NAN, f64::NAN, f64::NAN);
        assert_eq!(
            key,
            CombinationKey::new(UptrendStrength::Weak, DeclineDepth::Shallow, SupportLength::Short)
        );
    }

    #[test]
    fn parse_magnitude_defaults_to_zero() {
        assert_eq!(parse_magnitude("5.70%"), 5.7);
        assert_eq!(parse_magnitude(" 1,234 "), 1234.0);
        assert_eq!(parse_magnitude("n/a"), 0.0);
        assert_eq!(parse_magnitude(""), 0.0);
        assert_eq!(parse_magnitude("inf"), 0.0);
    }

    #[test]
    fn malformed_record_lands_in_lowest_buckets() {
        let record = MagnitudeRecord {
            uptrend_gain: "abc%".into(),
            decline_pct: "1.8%".into(),
            support_candles: "".into(),
        };
        let key = record.combination_key();
        assert_eq!(key.uptrend, UptrendStrength::Weak);
        assert_eq!(key.decline, DeclineDepth::Moderate);
        assert_eq!(key.support, SupportLength::Short);
    }

    #[test]
    fn key_text_form() {
        let key = CombinationKey::from_magnitudes(6.5, 1.2, 2.0);
        assert_eq!(key.to_string(), "strong+shallow+short");
        let full = key.with_breakout(CandleDirection::Bullish);
        assert_eq!(full.to_string(), "strong+shallow+short+bullish");
        assert_eq!("Strong + Shallow + Short + Bullish".parse::<CombinationKey>().unwrap(), full);
        assert_eq!(full.stages_only(), key);
        assert!("strong+shallow".parse::<CombinationKey>().is_err());
        assert!("strong+flat+short".parse::<CombinationKey>().is_err());
    }
}
