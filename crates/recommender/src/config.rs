//! Recommender configuration
//!
//! Loaded from TOML, optionally overridden from `METAREC_*` environment
//! variables, and validated before a recommender is built.

use crate::errors::{RecommenderError, Result};
use metarec_gbdt::GbdtConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Kind of algorithms being recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MlType {
    Classifier,
    Regressor,
}

impl MlType {
    /// Metric used when none is configured
    pub fn default_metric(self) -> &'static str {
        match self {
            MlType::Classifier => "bal_accuracy",
            MlType::Regressor => "mse",
        }
    }
}

impl FromStr for MlType {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classifier" => Ok(MlType::Classifier),
            "regressor" => Ok(MlType::Regressor),
            other => Err(RecommenderError::Configuration(format!(
                "ml_type must be \"classifier\" or \"regressor\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for MlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlType::Classifier => f.write_str("classifier"),
            MlType::Regressor => f.write_str("regressor"),
        }
    }
}

/// Which rows an update trains on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingWindow {
    /// Only the records passed to the current update
    #[default]
    Latest,
    /// Every joined row from every update so far
    Accumulate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub ml_type: MlType,
    /// Label column; `None` picks [`MlType::default_metric`]
    pub metric: Option<String>,
    /// Candidates scored per recommendation
    pub sample_size: usize,
    /// Seed for candidate sampling; entropy when unset
    pub seed: Option<u64>,
    /// Skip candidates already evaluated on the requested dataset
    pub exclude_seen: bool,
    pub training_window: TrainingWindow,
    pub gbdt: GbdtConfig,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            ml_type: MlType::Classifier,
            metric: None,
            sample_size: 100,
            seed: None,
            exclude_seen: false,
            training_window: TrainingWindow::Latest,
            gbdt: GbdtConfig::default(),
        }
    }
}

impl RecommenderConfig {
    pub fn new(ml_type: MlType) -> Self {
        Self {
            ml_type,
            ..Self::default()
        }
    }

    /// Label column used for training
    pub fn metric(&self) -> &str {
        self.metric
            .as_deref()
            .unwrap_or_else(|| self.ml_type.default_metric())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading recommender configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML document; a bad `ml_type` is a configuration error
    /// rather than a TOML error
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        if let Some(value) = table.get("ml_type") {
            let name = value.as_str().ok_or_else(|| {
                RecommenderError::Configuration(format!("ml_type must be a string, got {value}"))
            })?;
            name.parse::<MlType>()?;
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Apply `METAREC_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; unparsable values are
    /// configuration errors
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("METAREC_ML_TYPE") {
            self.ml_type = val.parse()?;
        }
        if let Some(val) = lookup("METAREC_METRIC") {
            self.metric = Some(val);
        }
        if let Some(val) = lookup("METAREC_SAMPLE_SIZE") {
            self.sample_size = parse_env("METAREC_SAMPLE_SIZE", &val)?;
        }
        if let Some(val) = lookup("METAREC_SEED") {
            self.seed = Some(parse_env("METAREC_SEED", &val)?);
        }
        if let Some(val) = lookup("METAREC_EXCLUDE_SEEN") {
            self.exclude_seen = parse_env("METAREC_EXCLUDE_SEEN", &val)?;
        }
        if let Some(val) = lookup("METAREC_GBDT_TREES") {
            self.gbdt.num_trees = parse_env("METAREC_GBDT_TREES", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(RecommenderError::Configuration(
                "sample_size must be at least 1".into(),
            ));
        }
        if self.metric().is_empty() {
            return Err(RecommenderError::Configuration("metric name is empty".into()));
        }
        self.gbdt
            .validate()
            .map_err(|e| RecommenderError::Configuration(e.to_string()))
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RecommenderError::Configuration(format!("invalid value {value:?} for {key}"))
    })
}
