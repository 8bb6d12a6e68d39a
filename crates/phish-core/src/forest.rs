//! Random forest of CART classification trees.
//!
//! Each tree is grown on a bootstrap sample of the training rows. At every
//! node a random subset of features is searched for the threshold with the
//! lowest weighted Gini impurity. Leaves store the fraction of phishing rows
//! that reached them, and the forest averages those fractions (soft vote).
//!
//! Trees are fitted in parallel with rayon. Each tree draws its seed from a
//! master RNG in tree order, so a given seed always yields the same forest.

use std::ops::Sub;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::error::{PhishError, Result};
use crate::label::Label;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassCounts {
    safe: usize,
    phishing: usize,
}

impl ClassCounts {
    fn of(samples: &[usize], labels: &[Label]) -> Self {
        let mut counts = Self::default();
        for &i in samples {
            counts.add(labels[i]);
        }
        counts
    }

    fn add(&mut self, label: Label) {
        match label {
            Label::Safe => self.safe += 1,
            Label::Phishing => self.phishing += 1,
        }
    }

    fn total(self) -> usize {
        self.safe + self.phishing
    }

    fn is_pure(self) -> bool {
        self.safe == 0 || self.phishing == 0
    }

    fn phishing_ratio(self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.phishing as f64 / self.total() as f64
        }
    }

    fn gini(self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let p_safe = self.safe as f64 / total;
        let p_phish = self.phishing as f64 / total;
        1.0 - p_safe * p_safe - p_phish * p_phish
    }
}

impl Sub for ClassCounts {
    type Output = ClassCounts;
    fn sub(self, rhs: Self) -> Self::Output {
        ClassCounts {
            safe: self.safe - rhs.safe,
            phishing: self.phishing - rhs.phishing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        phishing_ratio: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// A single classification tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(
        features: ArrayView2<'_, f64>,
        labels: &[Label],
        samples: &[usize],
        config: &ForestConfig,
        seed: u64,
    ) -> Self {
        let mut builder = TreeBuilder {
            features: features.reborrow(),
            labels,
            config,
            max_features: config.max_features.resolve(features.ncols()),
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
        };
        builder.grow(samples, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Phishing ratio of the leaf `sample` falls into.
    pub fn phishing_ratio(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { phishing_ratio }) => return *phishing_ratio,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

struct TreeBuilder<'a> {
    features: ArrayView2<'a, f64>,
    labels: &'a [Label],
    config: &'a ForestConfig,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, samples: &[usize], depth: usize) -> usize {
        let counts = ClassCounts::of(samples, self.labels);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            phishing_ratio: counts.phishing_ratio(),
        });

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if counts.is_pure() || samples.len() < self.config.min_samples_split || depth_reached {
            return idx;
        }

        let Some(split) = self.best_split(samples, counts) else {
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.features[[i, split.feature]] <= split.threshold);

        let left = self.grow(&left_samples, depth + 1);
        let right = self.grow(&right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, samples: &[usize], total: ClassCounts) -> Option<Split> {
        let mut order: Vec<usize> = (0..self.features.ncols()).collect();
        order.shuffle(&mut self.rng);

        let n = samples.len() as f64;
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<Split> = None;
        let mut searched = 0;
        let mut column: Vec<(f64, Label)> = Vec::with_capacity(samples.len());

        for feature in order {
            if searched >= self.max_features {
                break;
            }

            column.clear();
            column.extend(
                samples
                    .iter()
                    .map(|&i| (self.features[[i, feature]], self.labels[i])),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Constant features don't count toward max_features.
            if column[0].0 == column[column.len() - 1].0 {
                continue;
            }
            searched += 1;

            let mut left = ClassCounts::default();
            for pos in 0..column.len() - 1 {
                left.add(column[pos].1);
                let (value, next) = (column[pos].0, column[pos + 1].0);
                if value == next {
                    continue;
                }
                let right = total - left;
                if left.total() < min_leaf || right.total() < min_leaf {
                    continue;
                }

                let impurity = (left.total() as f64 * left.gini()
                    + right.total() as f64 * right.gini())
                    / n;
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on a row-major feature table and its aligned labels.
    pub fn fit(
        features: ArrayView2<'_, f64>,
        labels: &[Label],
        config: &ForestConfig,
    ) -> Result<Self> {
        let rows = features.nrows();
        if rows == 0 {
            return Err(PhishError::InsufficientRows { rows });
        }
        if labels.len() != rows {
            return Err(PhishError::InvalidConfig(format!(
                "{} labels for {} feature rows",
                labels.len(),
                rows
            )));
        }
        if config.n_trees == 0 {
            return Err(PhishError::InvalidConfig("n_trees must be at least 1".into()));
        }

        let mut master = StdRng::seed_from_u64(config.seed);
        let tree_seeds: Vec<(u64, u64)> = (0..config.n_trees)
            .map(|_| (master.random(), master.random()))
            .collect();

        let trees = tree_seeds
            .into_par_iter()
            .map(|(sample_seed, split_seed)| {
                let samples = if config.bootstrap {
                    let mut rng = StdRng::seed_from_u64(sample_seed);
                    (0..rows).map(|_| rng.random_range(0..rows)).collect()
                } else {
                    (0..rows).collect::<Vec<usize>>()
                };
                DecisionTree::fit(features, labels, &samples, config, split_seed)
            })
            .collect();

        Ok(Self {
            n_features: features.ncols(),
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean phishing ratio over all trees.
    pub fn phishing_probability(&self, sample: &[f64]) -> Result<f64> {
        if sample.len() != self.n_features {
            return Err(PhishError::FeatureMismatch {
                expected: self.n_features,
                actual: sample.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.phishing_ratio(sample)).sum();
        Ok(sum / self.trees.len().max(1) as f64)
    }

    pub fn predict(&self, sample: &[f64]) -> Result<Label> {
        let p = self.phishing_probability(sample)?;
        Ok(if p > 0.5 { Label::Phishing } else { Label::Safe })
    }
}
