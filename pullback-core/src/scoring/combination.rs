//! Combination table: historical bonus/penalty per structural combination.
//!
//! Lookup tries the full key (with breakout direction) and then the
//! three-stage key; anything else is neutral.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stages::buckets::{
    CombinationKey, DeclineDepth, ParseKeyError, SupportLength, UptrendStrength,
};

/// Trade history of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationHistory {
    pub key: CombinationKey,
    pub trades: u32,
    pub wins: u32,
    pub net_profit_pct: f64,
}

impl CombinationHistory {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.trades)
        }
    }
}

/// How trade history turns into adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentPolicy {
    pub min_trades: u32,
    pub penalty: i32,
    pub severe_penalty: i32,
    pub severe_max_win_rate: f64,
    pub bonus: i32,
    pub bonus_min_win_rate: f64,
}

impl Default for AdjustmentPolicy {
    fn default() -> Self {
        Self {
            min_trades: 10,
            penalty: -30,
            severe_penalty: -50,
            severe_max_win_rate: 0.10,
            bonus: 10,
            bonus_min_win_rate: 0.70,
        }
    }
}

impl AdjustmentPolicy {
    /// Adjustment for one history row, `None` when it earns no entry.
    pub fn adjustment(&self, history: &CombinationHistory) -> Option<(i32, String)> {
        if history.trades < self.min_trades {
            return None;
        }
        let win_rate = history.win_rate();
        if history.net_profit_pct < 0.0 {
            let adj = if win_rate <= self.severe_max_win_rate {
                self.severe_penalty
            } else {
                self.penalty
            };
            Some((
                adj,
                format!(
                    "net-negative over {} trades ({:.1}% win, {:+.2}% net)",
                    history.trades,
                    win_rate * 100.0,
                    history.net_profit_pct
                ),
            ))
        } else if history.net_profit_pct > 0.0 && win_rate >= self.bonus_min_win_rate {
            Some((
                self.bonus,
                format!(
                    "net-positive over {} trades ({:.1}% win, {:+.2}% net)",
                    history.trades,
                    win_rate * 100.0,
                    history.net_profit_pct
                ),
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinationConfig {
    /// Blocks when `base + adjustment <= floor`.
    pub floor: f64,
    pub policy: AdjustmentPolicy,
    pub table: CombinationTable,
}

impl Default for CombinationConfig {
    fn default() -> Self {
        Self {
            floor: 0.0,
            policy: AdjustmentPolicy::default(),
            table: CombinationTable::reference(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub key: String,
    pub adjustment: i32,
    #[serde(default)]
    pub reason: String,
}

/// Result of scoring one key against the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationScore {
    pub adjustment: i32,
    /// The table key that matched, if any.
    pub matched: Option<CombinationKey>,
    pub reason: String,
}

/// Map from combination key to integer adjustment.
///
/// Serialized as a list of `{ key = "weak+deep+short", adjustment = -100 }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TableEntry>", into = "Vec<TableEntry>")]
pub struct CombinationTable {
    entries: BTreeMap<CombinationKey, (i32, String)>,
}

impl CombinationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four losing combinations observed in production, each blocked outright.
    pub fn reference() -> Self {
        use DeclineDepth as D;
        use SupportLength as S;
        use UptrendStrength as U;

        let mut table = Self::new();
        for (u, d, s) in [
            (U::Weak, D::Deep, S::Short),
            (U::Weak, D::Moderate, S::Short),
            (U::Moderate, D::Moderate, S::Moderate),
            (U::Moderate, D::Moderate, S::Short),
        ] {
            table.insert(CombinationKey::new(u, d, s), -100, "losing combination");
        }
        table
    }

    pub fn from_history<'a>(
        rows: impl IntoIterator<Item = &'a CombinationHistory>,
        policy: &AdjustmentPolicy,
    ) -> Self {
        let mut table = Self::new();
        for row in rows {
            if let Some((adj, reason)) = policy.adjustment(row) {
                table.insert(row.key, adj, reason);
            }
        }
        debug!(entries = table.len(), "combination table derived from history");
        table
    }

    pub fn insert(&mut self, key: CombinationKey, adjustment: i32, reason: impl Into<String>) {
        self.entries.insert(key, (adjustment, reason.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CombinationKey, i32)> {
        self.entries.iter().map(|(k, (adj, _))| (k, *adj))
    }

    /// Entries of `other` replace entries of `self` with the same key.
    pub fn merge(&mut self, other: &CombinationTable) {
        for (k, v) in &other.entries {
            self.entries.insert(*k, v.clone());
        }
    }

    /// Full key first, then the three-stage key.
    fn entry(&self, key: &CombinationKey) -> Option<(&CombinationKey, &(i32, String))> {
        self.entries
            .get_key_value(key)
            .or_else(|| self.entries.get_key_value(&key.stages_only()))
    }

    pub fn score(&self, key: &CombinationKey) -> CombinationScore {
        match self.entry(key) {
            Some((matched, (adjustment, reason))) => CombinationScore {
                adjustment: *adjustment,
                matched: Some(*matched),
                reason: if reason.is_empty() {
                    format!("{matched}: {adjustment:+}")
                } else {
                    format!("{matched}: {reason} ({adjustment:+})")
                },
            },
            None => CombinationScore {
                adjustment: 0,
                matched: None,
                reason: format!("{key}: no history"),
            },
        }
    }
}

impl TryFrom<Vec<TableEntry>> for CombinationTable {
    type Error = ParseKeyError;

    fn try_from(entries: Vec<TableEntry>) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for e in entries {
            table.insert(e.key.parse()?, e.adjustment, e.reason);
        }
        Ok(table)
    }
}

impl From<CombinationTable> for Vec<TableEntry> {
    fn from(table: CombinationTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(k, (adjustment, reason))| TableEntry {
                key: k.to_string(),
                adjustment,
                reason,
            })
            .collect()
    }
}
