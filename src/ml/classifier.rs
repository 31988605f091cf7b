use crate::error::{AppError, Result};
use crate::ml::models::{BoostingParams, ModelMetrics, TrainingDataset};
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

/// Weak learner fit on each class's residuals
pub type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Train the classifier, returning metrics on the training data
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics>;

    /// Predict class indices
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict class probabilities (n_samples × n_classes)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Number of classes the model emits
    fn n_classes(&self) -> usize;

    /// Input width the model was trained on
    fn n_features(&self) -> usize;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

fn tree_parameters(params: &BoostingParams) -> DecisionTreeRegressorParameters {
    DecisionTreeRegressorParameters::default()
        .with_max_depth(u16::try_from(params.max_depth).unwrap_or(u16::MAX))
        .with_min_samples_leaf(params.min_samples_leaf)
        .with_min_samples_split(params.min_samples_split)
}

/// Softmax over each row of a margin matrix
fn softmax_rows(margins: &Array2<f64>) -> Array2<f64> {
    let mut probs = margins.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|m| (m - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|e| e / sum);
    }
    probs
}

/// Multi-class gradient boosted tree ensemble with a softmax objective.
///
/// Every round fits one regression tree per class on the residuals
/// `1{y = k} - p_k` and adds its shrunken output to that class's margin.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    params: BoostingParams,

    /// Class names in index order
    class_names: Vec<String>,

    n_features: usize,

    /// One tree per class for every boosting round
    trees: Vec<Vec<RegressionTree>>,

    trained: bool,
}

impl GradientBoostingClassifier {
    pub fn new(params: BoostingParams, class_names: Vec<String>) -> Self {
        Self {
            params,
            class_names,
            n_features: 0,
            trees: Vec::new(),
            trained: false,
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Check the input matrix before touching any tree
    fn check_input(&self, features: &Array2<f64>) -> Result<()> {
        if features.ncols() != self.n_features {
            return Err(AppError::classifier(
                None,
                format!(
                    "expected {} features, got {}",
                    self.n_features,
                    features.ncols()
                ),
            ));
        }
        check_finite(features)
    }

    /// Add one tree's shrunken output to a class's margin column
    fn accumulate(
        &self,
        margins: &mut Array2<f64>,
        class: usize,
        tree: &RegressionTree,
        x: &DenseMatrix<f64>,
    ) -> Result<()> {
        let output = tree
            .predict(x)
            .map_err(|e| AppError::classifier(None, format!("tree prediction failed: {}", e)))?;
        for (margin, value) in margins.column_mut(class).iter_mut().zip(output) {
            *margin += self.params.learning_rate * value;
        }
        Ok(())
    }

    fn margins(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let mut margins = Array2::zeros((features.nrows(), self.class_names.len()));
        if features.nrows() == 0 {
            return Ok(margins);
        }

        let x = ndarray_to_densematrix(features);
        for round in &self.trees {
            for (class, tree) in round.iter().enumerate() {
                self.accumulate(&mut margins, class, tree, &x)?;
            }
        }
        Ok(margins)
    }

    /// Structural sanity check used after deserialization
    pub fn is_consistent(&self) -> bool {
        let n_classes = self.class_names.len();
        self.trained
            && n_classes >= 2
            && self.n_features > 0
            && self.params.validate().is_ok()
            && self.trees.len() == self.params.n_estimators
            && self.trees.iter().all(|round| round.len() == n_classes)
    }
}

fn check_finite(features: &Array2<f64>) -> Result<()> {
    for (i, row) in features.axis_iter(Axis(0)).enumerate() {
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(AppError::classifier(
                Some(i),
                format!("non-finite value in feature column {}", col),
            ));
        }
    }
    Ok(())
}

impl Classifier for GradientBoostingClassifier {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        self.params.validate()?;

        let n_classes = self.class_names.len();
        if n_classes < 2 {
            return Err(AppError::Configuration(
                "gradient boosting needs at least two classes".to_string(),
            ));
        }
        if dataset.n_samples == 0 || dataset.n_features == 0 {
            return Err(AppError::classifier(
                None,
                format!(
                    "cannot train on a {}x{} feature matrix",
                    dataset.n_samples, dataset.n_features
                ),
            ));
        }
        if let Some(row) = dataset.labels.iter().position(|&y| y >= n_classes) {
            return Err(AppError::classifier(
                Some(row),
                format!("label {} outside 0..{}", dataset.labels[row], n_classes),
            ));
        }
        check_finite(&dataset.features)?;

        let n = dataset.n_samples;
        let x = ndarray_to_densematrix(&dataset.features);
        let parameters = tree_parameters(&self.params);
        let mut margins = Array2::<f64>::zeros((n, n_classes));
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for round in 0..self.params.n_estimators {
            let probs = softmax_rows(&margins);

            // Class trees within a round are independent given the current margins
            let round_trees = (0..n_classes)
                .into_par_iter()
                .map(|class| {
                    let residuals: Vec<f64> = (0..n)
                        .map(|i| {
                            let target = if dataset.labels[i] == class { 1.0 } else { 0.0 };
                            target - probs[[i, class]]
                        })
                        .collect();

                    RegressionTree::fit(&x, &residuals, parameters.clone()).map_err(|e| {
                        AppError::classifier(
                            None,
                            format!("round {} class {}: tree fit failed: {}", round, class, e),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for (class, tree) in round_trees.iter().enumerate() {
                self.accumulate(&mut margins, class, tree, &x)?;
            }
            trees.push(round_trees);

            if (round + 1) % 25 == 0 {
                tracing::debug!(round = round + 1, "Boosting round completed");
            }
        }

        self.trees = trees;
        self.n_features = dataset.n_features;
        self.trained = true;

        let predictions = self.predict(&dataset.features)?;
        ModelMetrics::calculate(&dataset.labels, &predictions, &self.class_names)
            .ok_or_else(|| AppError::Internal("no training metrics computed".to_string()))
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;

        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (idx, &p)| {
                        if p > best.1 {
                            (idx, p)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::classifier(None, "Model not trained"));
        }
        self.check_input(features)?;

        Ok(softmax_rows(&self.margins(features)?))
    }

    fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}
