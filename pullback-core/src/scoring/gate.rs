//! Confidence gate: required confidence by session window and daily strength.
//!
//! Each window carries a base requirement and ordered overrides; the first
//! override whose conditions all hold replaces the base. Hours outside every
//! window use `other_hours`.
//!
//! | window            | base | overrides (first match)                 |
//! |-------------------|------|-----------------------------------------|
//! | midday [12, 14)   | 85   | strength < 60 → 95; ideal → 80          |
//! | opening [9, 10)   | 70   | strength ≥ 70 → 65; strength < 40 → 80  |
//! | other hours       | 75   | ideal and strength ≥ 70 → 70; < 50 → 85 |

use serde::{Deserialize, Serialize};

use super::daily::DailyContext;

/// One conditional requirement. Unset conditions always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength_below: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength_at_least: Option<f64>,
    #[serde(default)]
    pub requires_ideal: bool,
    pub required: f64,
}

impl GateOverride {
    pub fn matches(&self, context: &DailyContext) -> bool {
        self.strength_below.map_or(true, |t| context.strength < t)
            && self.strength_at_least.map_or(true, |t| context.strength >= t)
            && (!self.requires_ideal || context.ideal)
    }

    fn below(threshold: f64, required: f64) -> Self {
        Self {
            strength_below: Some(threshold),
            strength_at_least: None,
            requires_ideal: false,
            required,
        }
    }

    fn at_least(threshold: f64, required: f64) -> Self {
        Self {
            strength_below: None,
            strength_at_least: Some(threshold),
            requires_ideal: false,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRule {
    pub base: f64,
    #[serde(default)]
    pub overrides: Vec<GateOverride>,
}

impl GateRule {
    pub fn required(&self, context: &DailyContext) -> f64 {
        self.overrides
            .iter()
            .find(|o| o.matches(context))
            .map_or(self.base, |o| o.required)
    }
}

/// Half-open hour range `[start_hour, end_hour)` with its rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
    pub rule: GateRule,
}

impl SessionWindow {
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }
}

/// Resolved requirement for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRequirement {
    pub window: String,
    pub required: f64,
}

pub const OTHER_HOURS: &str = "other";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Checked in order; the first containing window applies.
    pub windows: Vec<SessionWindow>,
    pub other_hours: GateRule,
    /// Context assumed when no daily data is available.
    pub missing_context: DailyContext,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                SessionWindow {
                    name: "midday".into(),
                    start_hour: 12,
                    end_hour: 14,
                    rule: GateRule {
                        base: 85.0,
                        overrides: vec![
                            GateOverride::below(60.0, 95.0),
                            GateOverride {
                                strength_below: None,
                                strength_at_least: None,
                                requires_ideal: true,
                                required: 80.0,
                            },
                        ],
                    },
                },
                SessionWindow {
                    name: "opening".into(),
                    start_hour: 9,
                    end_hour: 10,
                    rule: GateRule {
                        base: 70.0,
                        overrides: vec![
                            GateOverride::at_least(70.0, 65.0),
                            GateOverride::below(40.0, 80.0),
                        ],
                    },
                },
            ],
            other_hours: GateRule {
                base: 75.0,
                overrides: vec![
                    GateOverride {
                        strength_below: None,
                        strength_at_least: Some(70.0),
                        requires_ideal: true,
                        required: 70.0,
                    },
                    GateOverride::below(50.0, 85.0),
                ],
            },
            missing_context: DailyContext::conservative(),
        }
    }
}

impl GateConfig {
    pub fn requirement(&self, hour: u32, context: &DailyContext) -> GateRequirement {
        match self.windows.iter().find(|w| w.contains(hour)) {
            Some(w) => GateRequirement {
                window: w.name.clone(),
                required: w.rule.required(context),
            },
            None => GateRequirement {
                window: OTHER_HOURS.to_string(),
                required: self.other_hours.required(context),
            },
        }
    }

    /// Required confidence for an hour, strength and ideal flag.
    pub fn required(&self, hour: u32, strength: f64, ideal: bool) -> f64 {
        self.requirement(hour, &DailyContext::new(strength, ideal))
            .required
    }

    /// `adjusted >= required`.
    pub fn passes(&self, hour: u32, context: &DailyContext, adjusted: f64) -> bool {
        adjusted >= self.requirement(hour, context).required
    }
}
