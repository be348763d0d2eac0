use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic configuration hash (BLAKE3 over canonical JSON of a config).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one intraday session of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    pub symbol: String,
    pub date: chrono::NaiveDate,
}

impl SessionId {
    pub fn new(symbol: impl Into<String>, date: chrono::NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn config_hash_deterministic() {
        let a = ConfigHash::from_bytes(b"{\"lookback\":10}");
        let b = ConfigHash::from_bytes(b"{\"lookback\":10}");
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn config_hash_changes_with_input() {
        let a = ConfigHash::from_bytes(b"{\"lookback\":10}");
        let b = ConfigHash::from_bytes(b"{\"lookback\":11}");
        assert_ne!(a, b);
    }

    #[test]
    fn session_ordering_is_symbol_then_date() {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut ids = vec![
            SessionId::new("BBB", d1),
            SessionId::new("AAA", d2),
            SessionId::new("AAA", d1),
        ];
        ids.sort();
        assert_eq!(ids[0], SessionId::new("AAA", d1));
        assert_eq!(ids[1], SessionId::new("AAA", d2));
        assert_eq!(ids[2].to_string(), format!("BBB@{d1}"));
    }
}
