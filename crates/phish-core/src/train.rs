//! Training pipeline: dataset → feature table → seeded split → forest → artifact.

use std::path::PathBuf;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::config::TrainConfig;
use crate::dataset::{self, LabeledUrl, PrepareStats};
use crate::error::{PhishError, Result};
use crate::features::FeatureSet;
use crate::forest::RandomForest;
use crate::label::Label;
use crate::model::ModelArtifact;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub model_path: PathBuf,
    pub feature_set: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub lines_dropped: usize,
    pub rows_skipped: usize,
    /// Accuracy on the held-out partition.
    pub test_accuracy: f64,
}

/// Feature table (one row per URL) and the labels aligned with it.
pub fn build_feature_table(rows: &[LabeledUrl], set: FeatureSet) -> (Array2<f64>, Vec<Label>) {
    let width = set.len();
    let mut table = Array2::zeros((rows.len(), width));
    for (mut out, row) in table.axis_iter_mut(Axis(0)).zip(rows) {
        for (cell, value) in out.iter_mut().zip(set.extract(&row.url)) {
            *cell = value;
        }
    }
    let labels = rows.iter().map(|r| r.label).collect();
    (table, labels)
}

/// Shuffle `0..n` with `seed` and hold out `ceil(n * test_fraction)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 || n_test == 0 || n_test >= n {
        return Err(PhishError::InsufficientRows { rows: n });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}

fn accuracy(forest: &RandomForest, features: &Array2<f64>, labels: &[Label]) -> Result<f64> {
    if labels.is_empty() {
        return Ok(0.0);
    }
    let mut correct = 0;
    for (row, expected) in features.axis_iter(Axis(0)).zip(labels) {
        if forest.predict(&row.to_vec())? == *expected {
            correct += 1;
        }
    }
    Ok(correct as f64 / labels.len() as f64)
}

/// Fit a forest on already prepared rows. Returns the artifact and the
/// held-out accuracy.
pub fn fit_rows(rows: &[LabeledUrl], config: &TrainConfig) -> Result<(ModelArtifact, f64)> {
    let (features, labels) = build_feature_table(rows, config.feature_set);
    let split = train_test_split(rows.len(), config.test_fraction, config.split_seed)?;

    let x_train = features.select(Axis(0), &split.train);
    let y_train: Vec<Label> = split.train.iter().map(|&i| labels[i]).collect();
    let x_test = features.select(Axis(0), &split.test);
    let y_test: Vec<Label> = split.test.iter().map(|&i| labels[i]).collect();

    let forest = RandomForest::fit(x_train.view(), &y_train, &config.forest)?;
    let test_accuracy = accuracy(&forest, &x_test, &y_test)?;

    let artifact = ModelArtifact::new(
        config.feature_set,
        forest,
        split.train.len(),
        split.test.len(),
    );
    Ok((artifact, test_accuracy))
}

/// Run the whole training pipeline and persist the model.
pub fn run(config: &TrainConfig) -> Result<TrainReport> {
    config.validate()?;

    let dataset = dataset::prepare(config)?;
    let PrepareStats {
        lines_dropped,
        rows_skipped,
        ..
    } = dataset.stats;

    let (artifact, test_accuracy) = fit_rows(&dataset.rows, config)?;
    info!(
        feature_set = %config.feature_set,
        train_rows = artifact.train_rows,
        test_rows = artifact.test_rows,
        trees = artifact.forest.n_trees(),
        test_accuracy,
        "model trained"
    );

    artifact.save(&config.model_path)?;
    info!(path = %config.model_path.display(), "model saved");

    Ok(TrainReport {
        model_path: config.model_path.clone(),
        feature_set: config.feature_set.to_string(),
        train_rows: artifact.train_rows,
        test_rows: artifact.test_rows,
        lines_dropped,
        rows_skipped,
        test_accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::UrlInput;

    fn row(url: &str, label: Label) -> LabeledUrl {
        LabeledUrl {
            url: url.into(),
            label,
        }
    }

    #[test]
    fn split_is_80_20_and_disjoint() {
        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_rounds_test_size_up() {
        let split = train_test_split(2, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.train.len(), 1);
        let split = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
    }

    #[test]
    fn split_is_reproducible() {
        assert_eq!(
            train_test_split(50, 0.2, 7).unwrap(),
            train_test_split(50, 0.2, 7).unwrap()
        );
    }

    #[test]
    fn too_few_rows_is_an_error() {
        assert!(matches!(
            train_test_split(1, 0.2, 42),
            Err(PhishError::InsufficientRows { rows: 1 })
        ));
        assert!(matches!(
            train_test_split(0, 0.2, 42),
            Err(PhishError::InsufficientRows { rows: 0 })
        ));
    }

    #[test]
    fn feature_table_is_row_aligned() {
        let rows = vec![
            row("https://github.com/openai", Label::Safe),
            LabeledUrl {
                url: UrlInput::Invalid,
                label: Label::Phishing,
            },
        ];
        let (table, labels) = build_feature_table(&rows, FeatureSet::Lexical);
        assert_eq!(table.dim(), (2, 8));
        assert_eq!(table[[0, 3]], 1.0);
        assert!(table.row(1).iter().all(|&v| v == 0.0));
        assert_eq!(labels, vec![Label::Safe, Label::Phishing]);

        let (table, _) = build_feature_table(&rows, FeatureSet::Compact);
        assert_eq!(table.dim(), (2, 5));
    }

    #[test]
    fn fit_rows_records_partition_sizes() {
        let rows: Vec<LabeledUrl> = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    row(&format!("http://secure-login{i}.net/verify"), Label::Phishing)
                } else {
                    row(&format!("https://site{i}.org/"), Label::Safe)
                }
            })
            .collect();
        let config = TrainConfig {
            forest: crate::config::ForestConfig {
                n_trees: 10,
                ..Default::default()
            },
            ..TrainConfig::default()
        };
        let (artifact, accuracy) = fit_rows(&rows, &config).unwrap();
        assert_eq!(artifact.train_rows, 16);
        assert_eq!(artifact.test_rows, 4);
        assert_eq!(artifact.feature_set, FeatureSet::Lexical);
        assert!((0.0..=1.0).contains(&accuracy));
    }
}
