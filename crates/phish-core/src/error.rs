//! Error type shared by every stage of the pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhishError {
    #[error("input file {} was not found", path.display())]
    MissingInputFile { path: PathBuf },

    #[error("CSV file must contain 'url' and 'label' columns (missing: {})", missing.join(", "))]
    SchemaViolation { missing: Vec<String> },

    #[error("need at least 2 labeled rows to train, found {rows}")]
    InsufficientRows { rows: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("feature vector has {actual} values, model expects {expected}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("cannot load model from {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("cannot save model to {}: {source}", path.display())]
    ModelSave {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("cannot parse config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PhishError>;
