//! Training configuration, loadable from JSON with per-field defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PhishError, Result};
use crate::features::FeatureSet;

pub const DEFAULT_DATA_PATH: &str = "data/urls.csv";
pub const DEFAULT_CLEAN_PATH: &str = "data/urls_clean.csv";
pub const DEFAULT_MODEL_PATH: &str = "model/model.bin";

/// Lines longer than this many characters are dropped before parsing.
pub const DEFAULT_MAX_LINE_CHARS: usize = 10_000;
pub const DEFAULT_SEED: u64 = 42;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(n) => n,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub clean_path: PathBuf,
    pub model_path: PathBuf,
    pub feature_set: FeatureSet,
    pub max_line_chars: usize,
    pub test_fraction: f64,
    /// Seed for the train/test shuffle.
    pub split_seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            clean_path: PathBuf::from(DEFAULT_CLEAN_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            feature_set: FeatureSet::Lexical,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            test_fraction: 0.2,
            split_seed: DEFAULT_SEED,
            forest: ForestConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: TrainConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PhishError::InvalidConfig(format!(
                "test_fraction must be between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(PhishError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.forest.min_samples_split < 2 || self.forest.min_samples_leaf == 0 {
            return Err(PhishError::InvalidConfig(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1".into(),
            ));
        }
        if self.max_line_chars == 0 {
            return Err(PhishError::InvalidConfig("max_line_chars must be positive".into()));
        }
        Ok(())
    }
}
