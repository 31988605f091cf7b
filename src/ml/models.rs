use crate::error::{AppError, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Boosting rounds; one tree per class per round
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Maximum depth of each regression tree
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Shrinkage applied to every tree's output
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Minimum rows on each side of a split
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,

    /// Minimum rows a node needs before it may split
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            min_samples_leaf: default_min_samples_leaf(),
            min_samples_split: default_min_samples_split(),
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.n_estimators == 0 {
            problems.push("n_estimators must be positive".to_string());
        }
        if self.max_depth == 0 || self.max_depth > u16::MAX as usize {
            problems.push(format!("max_depth must be in 1..={}", u16::MAX));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            problems.push("learning_rate must be a positive number".to_string());
        }
        if self.min_samples_leaf == 0 {
            problems.push("min_samples_leaf must be positive".to_string());
        }
        if self.min_samples_split < 2 {
            problems.push("min_samples_split must be at least 2".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Configuration(problems.join("; ")))
        }
    }
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    5
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_min_samples_split() -> usize {
    2
}

/// Transformed feature matrix paired with encoded labels
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Class indices
    pub labels: Vec<usize>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    pub fn new(features: Array2<f64>, labels: Vec<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::Internal(format!(
                "feature matrix has {} rows but {} labels were given",
                features.nrows(),
                labels.len()
            )));
        }

        let (n_samples, n_features) = features.dim();
        Ok(Self {
            features,
            labels,
            n_samples,
            n_features,
        })
    }
}

/// Deterministic partition of row indices into train and test sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n_samples` with a seeded RNG; the test set takes ceil(n × test_size)
    pub fn seeded(n_samples: usize, test_size: f64, seed: u64) -> Result<Self> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let n_test = ((n_samples as f64) * test_size).ceil() as usize;
        let n_test = n_test.min(n_samples);
        if n_samples - n_test == 0 {
            return Err(AppError::data(
                format!(
                    "{} rows leave no training data at test_size {}",
                    n_samples, test_size
                ),
                vec![],
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test = indices[..n_test].to_vec();
        let train = indices[n_test..].to_vec();

        Ok(Self { train, test })
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Number of evaluated samples
    pub support: usize,

    /// Rows are true classes, columns predicted classes
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Per-class metrics keyed by class name
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Compare true and predicted class indices.
    ///
    /// `class_names[i]` labels class index `i`. Returns `None` for empty input.
    pub fn calculate(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Option<Self> {
        let n_samples = y_true.len();
        if n_samples == 0 || n_samples != y_pred.len() {
            return None;
        }
        let n_classes = class_names.len();

        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                confusion[t][p] += 1;
            }
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();
        for (class_idx, name) in class_names.iter().enumerate() {
            let tp = confusion[class_idx][class_idx];
            let fp: usize = (0..n_classes)
                .filter(|&t| t != class_idx)
                .map(|t| confusion[t][class_idx])
                .sum();
            let fn_count: usize = (0..n_classes)
                .filter(|&p| p != class_idx)
                .map(|p| confusion[class_idx][p])
                .sum();

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                name.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support: tp + fn_count,
                },
            );
        }

        let n = n_classes.max(1) as f64;
        let avg_precision = per_class.values().map(|m| m.precision).sum::<f64>() / n;
        let avg_recall = per_class.values().map(|m| m.recall).sum::<f64>() / n;
        let avg_f1 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n;

        Some(Self {
            accuracy,
            precision: avg_precision,
            recall: avg_recall,
            f1_score: avg_f1,
            support: n_samples,
            confusion_matrix: confusion,
            per_class_metrics: per_class,
        })
    }
}
