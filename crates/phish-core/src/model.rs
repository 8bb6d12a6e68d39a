//! Persisted model artifact and the scoring handle built from it.
//!
//! The artifact records the [`FeatureSet`] it was trained on, so scoring
//! always extracts the same layout the forest was fitted with. Vectors of
//! any other length are rejected with [`PhishError::FeatureMismatch`].

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PhishError, Result};
use crate::features::{FeatureSet, UrlInput};
use crate::forest::RandomForest;
use crate::label::Label;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_set: FeatureSet,
    pub feature_names: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(
        feature_set: FeatureSet,
        forest: RandomForest,
        train_rows: usize,
        test_rows: usize,
    ) -> Self {
        Self {
            feature_set,
            feature_names: feature_set.names().iter().map(|n| n.to_string()).collect(),
            train_rows,
            test_rows,
            forest,
        }
    }

    /// Write the artifact, replacing any file at `path` and creating its
    /// directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let save_err = |source: bincode::Error| PhishError::ModelSave {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self).map_err(save_err)?;
        writer.flush().map_err(|e| save_err(e.into()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |source: bincode::Error| PhishError::ModelLoad {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::open(path).map_err(|e| load_err(e.into()))?;
        let artifact: ModelArtifact =
            bincode::deserialize_from(BufReader::new(file)).map_err(load_err)?;

        if let Err(e) = artifact.check_arity() {
            return Err(load_err(Box::new(bincode::ErrorKind::Custom(format!(
                "{e} (feature set '{}')",
                artifact.feature_set
            )))));
        }
        Ok(artifact)
    }

    /// The forest must have been fitted on vectors of this feature set.
    pub fn check_arity(&self) -> Result<()> {
        if self.forest.n_features() != self.feature_set.len() {
            return Err(PhishError::FeatureMismatch {
                expected: self.forest.n_features(),
                actual: self.feature_set.len(),
            });
        }
        Ok(())
    }
}

/// A loaded model, owned by the caller.
#[derive(Debug, Clone)]
pub struct PhishingModel {
    artifact: ModelArtifact,
}

impl PhishingModel {
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        info!(
            path = %path.display(),
            feature_set = %artifact.feature_set,
            trees = artifact.forest.n_trees(),
            "model loaded"
        );
        Ok(Self { artifact })
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.artifact.feature_set
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Classify a URL using the feature set the model was trained on.
    pub fn classify(&self, url: &UrlInput) -> Label {
        let features = self.artifact.feature_set.extract(url);
        // Arity was checked when the handle was built.
        self.artifact
            .forest
            .predict(&features)
            .unwrap_or(Label::Safe)
    }

    pub fn predict_vector(&self, features: &[f64]) -> Result<Label> {
        self.artifact.forest.predict(features)
    }
}

impl TryFrom<ModelArtifact> for PhishingModel {
    type Error = PhishError;

    fn try_from(artifact: ModelArtifact) -> Result<Self> {
        artifact.check_arity()?;
        Ok(Self { artifact })
    }
}
