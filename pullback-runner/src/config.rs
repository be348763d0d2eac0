//! Batch run configuration: input files, parallelism and the pipeline.
//!
//! ```toml
//! parallel = true
//!
//! [inputs]
//! bars = "bars.csv"
//! daily_bars = "daily.csv"
//! history = "history.csv"
//!
//! [pipeline]
//! profile = "research"
//!
//! [pipeline.consolidation]
//! lookback = 12
//! ```
//!
//! The `[pipeline]` section follows the same profile-plus-overrides rules as
//! a standalone pipeline file. Relative input paths resolve against the
//! directory of the config file.

use std::path::{Path, PathBuf};

use pullback_core::domain::ConfigHash;
use pullback_core::{ConfigError, PipelineConfig};
use serde::{Deserialize, Serialize};

/// Where the batch reads its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    /// Intraday bars, `symbol,timestamp,open,high,low,close,volume`.
    pub bars: PathBuf,
    /// Daily bars for the daily-strength context.
    #[serde(default)]
    pub daily_bars: Option<PathBuf>,
    /// Per-combination trade history, merged over the configured table.
    #[serde(default)]
    pub history: Option<PathBuf>,
}

impl InputPaths {
    fn resolve_against(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.bars);
        if let Some(p) = self.daily_bars.as_mut() {
            join(p);
        }
        if let Some(p) = self.history.as_mut() {
            join(p);
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunSettings {
    inputs: InputPaths,
    #[serde(default = "default_parallel")]
    parallel: bool,
}

fn default_parallel() -> bool {
    true
}

/// Everything needed to reproduce a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub inputs: InputPaths,
    pub parallel: bool,
    pub pipeline: PipelineConfig,
}

impl RunConfig {
    pub fn new(inputs: InputPaths, pipeline: PipelineConfig) -> Self {
        Self {
            inputs,
            parallel: true,
            pipeline,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(content)?;
        let pipeline = match table.remove("pipeline") {
            None => PipelineConfig::default(),
            Some(toml::Value::Table(section)) => PipelineConfig::from_table(section)?,
            Some(_) => {
                return Err(ConfigError::Invalid {
                    field: "pipeline".into(),
                    reason: "expected a table".into(),
                })
            }
        };
        let settings: RunSettings = toml::Value::Table(table).try_into()?;
        Ok(Self {
            inputs: settings.inputs,
            parallel: settings.parallel,
            pipeline,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            config.inputs.resolve_against(dir);
        }
        Ok(config)
    }

    /// BLAKE3 over the canonical JSON form; stamps every batch report.
    ///
    /// Unlike [`PipelineConfig::config_hash`] this also covers the inputs.
    pub fn run_id(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(ConfigHash::from_bytes(&json))
    }
}
