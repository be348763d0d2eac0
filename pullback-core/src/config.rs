//! Pipeline configuration: one section per stage, named profiles, TOML
//! loading with per-key overrides, validation and a stable hash.
//!
//! A config file may name a `profile`; every other key overrides that
//! profile's value:
//!
//! ```toml
//! profile = "research"
//!
//! [consolidation]
//! lookback = 12
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::{AtrQuantileMode, BreakoutConfig, ConsolidationConfig};
use crate::domain::ConfigHash;
use crate::features::FeatureConfig;
use crate::scoring::{CombinationConfig, GateConfig, GateRule};
use crate::stages::ClassifierConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(String),
    #[error("unknown profile '{0}' (expected reference, research, conservative or aggressive)")]
    UnknownProfile(String),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Named parameter sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Live defaults: causal ATR quantile.
    #[default]
    Reference,
    /// Replay behaviour: whole-series ATR quantile.
    Research,
    /// Tighter consolidation, longer persistence, +5 on every gate requirement.
    Conservative,
    /// Looser consolidation, shorter persistence, -5 on every gate requirement.
    Aggressive,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Profile::Reference,
        Profile::Research,
        Profile::Conservative,
        Profile::Aggressive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Research => "research",
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
        }
    }

    pub fn config(self) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        match self {
            Self::Reference => {}
            Self::Research => {
                cfg.consolidation.atr_quantile_mode = AtrQuantileMode::Global;
            }
            Self::Conservative => {
                cfg.consolidation.bandwidth_max = 0.015;
                cfg.consolidation.range_pct_max = 0.005;
                cfg.consolidation.volume_ratio_max = 0.6;
                cfg.breakout.min_persist_bars = 5;
                cfg.breakout.volume_spike_multiple = 1.5;
                cfg.classifier.uptrend_min_gain = 0.04;
                shift_gate(&mut cfg.gate, 5.0);
            }
            Self::Aggressive => {
                cfg.consolidation.bandwidth_max = 0.025;
                cfg.consolidation.range_pct_max = 0.008;
                cfg.consolidation.volume_ratio_max = 0.8;
                cfg.breakout.min_persist_bars = 3;
                cfg.breakout.volume_spike_multiple = 1.1;
                cfg.classifier.uptrend_min_gain = 0.025;
                shift_gate(&mut cfg.gate, -5.0);
            }
        }
        cfg
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownProfile(s.to_string()))
    }
}

fn shift_gate(gate: &mut GateConfig, delta: f64) {
    let shift = |rule: &mut GateRule| {
        rule.base += delta;
        for o in &mut rule.overrides {
            o.required += delta;
        }
    };
    for w in &mut gate.windows {
        shift(&mut w.rule);
    }
    shift(&mut gate.other_hours);
}

/// Everything the evaluator needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub consolidation: ConsolidationConfig,
    pub breakout: BreakoutConfig,
    pub classifier: ClassifierConfig,
    pub combination: CombinationConfig,
    pub gate: GateConfig,
}

impl PipelineConfig {
    pub fn profile(profile: Profile) -> Self {
        profile.config()
    }

    /// Parse TOML: optional `profile` key, remaining keys override it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::from_table(toml::from_str(content)?)
    }

    /// Same as [`from_toml`](Self::from_toml) for an already parsed table,
    /// e.g. a `[pipeline]` section embedded in a larger file.
    pub fn from_table(mut overlay: toml::Table) -> Result<Self, ConfigError> {
        let profile = match overlay.remove("profile") {
            None => Profile::default(),
            Some(toml::Value::String(name)) => name.parse()?,
            Some(other) => return Err(ConfigError::UnknownProfile(other.to_string())),
        };

        let mut base = toml::Value::try_from(profile.config())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        merge(&mut base, toml::Value::Table(overlay));
        let config: PipelineConfig = base.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// BLAKE3 over the canonical JSON form.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(ConfigHash::from_bytes(&json))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;
        for (field, w) in [
            ("features.atr_window", f.atr_window),
            ("features.bb_window", f.bb_window),
            ("features.ma_window", f.ma_window),
            ("features.vol_short_window", f.vol_short_window),
            ("features.vol_long_window", f.vol_long_window),
        ] {
            if w == 0 {
                return Err(invalid(field, "window must be at least 1"));
            }
        }
        non_negative("features.bb_std_multiplier", f.bb_std_multiplier)?;

        let c = &self.consolidation;
        if c.lookback == 0 {
            return Err(invalid("consolidation.lookback", "must be at least 1"));
        }
        unit_interval("consolidation.atr_quantile", c.atr_quantile)?;
        non_negative("consolidation.bandwidth_max", c.bandwidth_max)?;
        non_negative("consolidation.range_pct_max", c.range_pct_max)?;
        non_negative("consolidation.ma_slope_max", c.ma_slope_max)?;
        non_negative("consolidation.volume_ratio_max", c.volume_ratio_max)?;

        let b = &self.breakout;
        non_negative("breakout.breakout_buffer", b.breakout_buffer)?;
        unit_interval("breakout.body_ratio_min", b.body_ratio_min)?;
        non_negative("breakout.volume_spike_multiple", b.volume_spike_multiple)?;
        non_negative("breakout.atr_range_multiple", b.atr_range_multiple)?;
        unit_interval("breakout.entry_range_fraction", b.entry_range_fraction)?;

        let k = &self.classifier;
        if k.analysis_window < 5 {
            return Err(invalid("classifier.analysis_window", "must be at least 5"));
        }
        for (field, n) in [
            ("classifier.uptrend_search_span", k.uptrend_search_span),
            ("classifier.max_uptrend_len", k.max_uptrend_len),
            ("classifier.max_decline_len", k.max_decline_len),
            ("classifier.max_support_len", k.max_support_len),
        ] {
            if n == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }
        unit_interval("classifier.entry_body_fraction", k.entry_body_fraction)?;
        unit_interval("classifier.uptrend_end_high_ratio", k.uptrend_end_high_ratio)?;
        finite("classifier.early_exit_confidence", k.early_exit_confidence)?;

        finite("combination.floor", self.combination.floor)?;
        let p = &self.combination.policy;
        unit_interval("combination.policy.severe_max_win_rate", p.severe_max_win_rate)?;
        unit_interval("combination.policy.bonus_min_win_rate", p.bonus_min_win_rate)?;

        for w in &self.gate.windows {
            if w.start_hour >= w.end_hour || w.end_hour > 24 {
                return Err(invalid(
                    "gate.windows",
                    format!("window '{}' must satisfy start < end <= 24", w.name),
                ));
            }
            check_rule(&format!("gate.windows.{}", w.name), &w.rule)?;
        }
        check_rule("gate.other_hours", &self.gate.other_hours)?;
        let s = self.gate.missing_context.strength;
        if !(0.0..=100.0).contains(&s) {
            return Err(invalid("gate.missing_context.strength", "must be within 0..=100"));
        }
        Ok(())
    }
}

fn check_rule(field: &str, rule: &GateRule) -> Result<(), ConfigError> {
    finite(field, rule.base)?;
    for o in &rule.overrides {
        finite(field, o.required)?;
    }
    Ok(())
}

fn finite(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite, got {v}")))
    }
}

fn non_negative(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a non-negative number, got {v}")))
    }
}

fn unit_interval(field: &str, v: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within 0..=1, got {v}")))
    }
}

/// Recursive table merge; non-table values in `overlay` replace.
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(b), toml::Value::Table(o)) => {
            for (k, v) in o {
                match b.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (b, o) => *b = o,
    }
}
