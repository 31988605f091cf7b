use crate::error::{AppError, Result};
use crate::metrics;
use crate::ml::artifact::{ArtifactMetadata, PipelineArtifact};
use crate::ml::classifier::{Classifier, GradientBoostingClassifier};
use crate::ml::dataset::RawTable;
use crate::ml::features::Preprocessor;
use crate::ml::labels::LabelCodec;
use crate::ml::models::{BoostingParams, ModelMetrics, TrainTestSplit, TrainingDataset};
use crate::ml::schema::{FeatureSchema, ProjectedRow};
use crate::models::FeatureValue;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use strum::Display;
use tracing::{error, info, warn};

/// Stages of a training run, strictly sequential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    Pending,
    LoadData,
    ValidateSchema,
    EncodeLabels,
    SplitTrainTest,
    Fit,
    Evaluate,
    SerializeArtifact,
    Done,
}

/// Inputs of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub data_path: PathBuf,
    pub artifact_path: PathBuf,
    pub test_size: f64,
    pub seed: u64,
    pub params: BoostingParams,
}

impl TrainingOptions {
    pub fn new(data_path: impl Into<PathBuf>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            artifact_path: artifact_path.into(),
            test_size: 0.2,
            seed: 42,
            params: BoostingParams::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_params(mut self, params: BoostingParams) -> Self {
        self.params = params;
        self
    }
}

impl From<&crate::config::Config> for TrainingOptions {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            data_path: config.training.data_path.clone(),
            artifact_path: config.model.artifact_path.clone(),
            test_size: config.training.test_size,
            seed: config.training.seed,
            params: config.training.boosting.clone(),
        }
    }
}

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_rows_loaded: usize,
    pub n_rows_dropped: usize,
    pub n_train: usize,
    pub n_test: usize,

    /// Row indices after dropping unlabeled rows
    pub split: TrainTestSplit,

    pub train_metrics: ModelMetrics,
    pub test_metrics: Option<ModelMetrics>,
    pub artifact_path: PathBuf,
    pub schema_fingerprint: String,
    pub duration_ms: u64,
}

/// Batch job that turns a labeled CSV into a pipeline artifact
pub struct TrainingProcedure {
    options: TrainingOptions,
    stage: TrainingStage,
}

impl TrainingProcedure {
    pub fn new(options: TrainingOptions) -> Self {
        Self {
            options,
            stage: TrainingStage::Pending,
        }
    }

    /// Current stage; after a failure, the stage that failed
    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Run every stage, stopping at the first failure
    pub fn run(&mut self) -> Result<TrainingReport> {
        let start = Instant::now();
        let result = self.run_stages(start);

        match &result {
            Ok(report) => {
                metrics::record_training("success");
                info!(
                    artifact = %report.artifact_path.display(),
                    n_train = report.n_train,
                    n_test = report.n_test,
                    duration_ms = report.duration_ms,
                    "Training completed"
                );
            }
            Err(e) => {
                metrics::record_training("failure");
                error!(stage = %self.stage, error = %e, "Training failed");
            }
        }

        result
    }

    fn enter(&mut self, stage: TrainingStage) {
        self.stage = stage;
        info!(stage = %stage, "Training stage started");
    }

    fn run_stages(&mut self, start: Instant) -> Result<TrainingReport> {
        self.options.params.validate()?;

        self.enter(TrainingStage::LoadData);
        let table = RawTable::from_csv_path(&self.options.data_path)?;
        if table.is_empty() {
            return Err(AppError::data(
                format!(
                    "training data '{}' contains no rows",
                    self.options.data_path.display()
                ),
                vec![],
            ));
        }
        let n_rows_loaded = table.n_rows();
        info!(rows = n_rows_loaded, "Training data loaded");

        self.enter(TrainingStage::ValidateSchema);
        let schema = FeatureSchema::canonical();
        let missing = schema.missing_columns(table.header());
        if !missing.is_empty() {
            return Err(AppError::schema_mismatch(
                "training data is missing required columns",
                missing,
            ));
        }

        let targets = table.column(schema.target())?;
        let labeled: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, cell)| !FeatureValue::from_cell(cell).is_missing())
            .map(|(idx, _)| idx)
            .collect();
        let n_rows_dropped = n_rows_loaded - labeled.len();
        if n_rows_dropped > 0 {
            warn!(
                dropped = n_rows_dropped,
                "Dropping rows without a {} label",
                schema.target()
            );
        }

        let table = table.select_rows(&labeled);
        if table.is_empty() {
            return Err(AppError::data(
                format!("no rows carry a {} label", schema.target()),
                vec![],
            ));
        }
        let projected = table.project(&schema)?;
        // Offenders are reported by their data-row index in the source file
        Preprocessor::check_numeric_cells(&schema, labeled.iter().copied().zip(&projected))?;

        self.enter(TrainingStage::EncodeLabels);
        let codec = LabelCodec::new();
        let labels = codec.encode_all(&table.column(schema.target())?)?;

        self.enter(TrainingStage::SplitTrainTest);
        let split = TrainTestSplit::seeded(projected.len(), self.options.test_size, self.options.seed)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            seed = self.options.seed,
            "Split train/test"
        );

        self.enter(TrainingStage::Fit);
        let (train_rows, train_labels) = gather(&projected, &labels, &split.train);
        let mut preprocessor = Preprocessor::new(schema.clone());
        let train_features = preprocessor.fit_transform(&train_rows)?;
        let dataset = TrainingDataset::new(train_features, train_labels)?;

        let mut classifier =
            GradientBoostingClassifier::new(self.options.params.clone(), codec.class_names());
        let train_metrics = classifier.train(&dataset)?;
        info!(
            accuracy = train_metrics.accuracy,
            n_features = dataset.n_features,
            "Classifier trained"
        );

        self.enter(TrainingStage::Evaluate);
        let test_metrics = if split.test.is_empty() {
            None
        } else {
            let (test_rows, test_labels) = gather(&projected, &labels, &split.test);
            let test_features = preprocessor.transform_batch(&test_rows)?;
            let predictions = classifier.predict(&test_features)?;
            ModelMetrics::calculate(&test_labels, &predictions, classifier.class_names())
        };
        match &test_metrics {
            Some(m) => info!(
                accuracy = m.accuracy,
                precision = m.precision,
                recall = m.recall,
                f1 = m.f1_score,
                "Held-out evaluation"
            ),
            None => warn!("Empty test split, no held-out metrics"),
        }

        self.enter(TrainingStage::SerializeArtifact);
        let metadata = ArtifactMetadata {
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: schema.version(),
            schema_fingerprint: schema.fingerprint(),
            n_rows_loaded,
            n_rows_dropped,
            n_train: split.train.len(),
            n_test: split.test.len(),
            params: self.options.params.clone(),
            train_metrics: Some(train_metrics.clone()),
            test_metrics: test_metrics.clone(),
            feature_names: preprocessor.output_feature_names(),
        };
        let artifact = PipelineArtifact::new(metadata, preprocessor, classifier)?;
        artifact.save(&self.options.artifact_path)?;

        self.enter(TrainingStage::Done);
        Ok(TrainingReport {
            n_rows_loaded,
            n_rows_dropped,
            n_train: split.train.len(),
            n_test: split.test.len(),
            split,
            train_metrics,
            test_metrics,
            artifact_path: self.options.artifact_path.clone(),
            schema_fingerprint: schema.fingerprint(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn gather(
    rows: &[ProjectedRow],
    labels: &[usize],
    indices: &[usize],
) -> (Vec<ProjectedRow>, Vec<usize>) {
    indices
        .iter()
        .map(|&i| (rows[i].clone(), labels[i]))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "lat,lon,elevation_meters,dist_to_coast_km,dist_to_major_river_km,\
avg_annual_rainfall_mm,seismic_zone,state,district,primary_hazard_type,risk_level";

    fn write_csv(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        write!(file, "{}", body).unwrap();
        path
    }

    fn rows(n: usize) -> String {
        (0..n)
            .map(|i| {
                let (elev, state, level) = match i % 3 {
                    0 => (400.0, "Kerala", "Low"),
                    1 => (120.0, "Odisha", "Medium"),
                    _ => (4.0, "Assam", "High"),
                };
                format!(
                    "{},{},{},{},12,1500,3,{},D{},Flood,{}\n",
                    10.0 + i as f64 * 0.1,
                    75.0 + i as f64 * 0.1,
                    elev + i as f64,
                    elev / 10.0,
                    state,
                    i % 4,
                    level
                )
            })
            .collect()
    }

    fn small_options(dir: &TempDir, data: PathBuf) -> TrainingOptions {
        TrainingOptions::new(data, dir.path().join("model.bin")).with_params(BoostingParams {
            n_estimators: 10,
            max_depth: 3,
            ..Default::default()
        })
    }

    #[test]
    fn test_run_reaches_done_and_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir, &rows(40));
        let mut procedure = TrainingProcedure::new(small_options(&dir, data));

        let report = procedure.run().unwrap();

        assert_eq!(procedure.stage(), TrainingStage::Done);
        assert_eq!(report.n_rows_loaded, 40);
        assert_eq!(report.n_test, 8);
        assert_eq!(report.n_train, 32);
        assert!(report.test_metrics.is_some());
        assert!(report.artifact_path.exists());
    }

    #[test]
    fn test_unlabeled_rows_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut body = rows(30);
        body.push_str("11,76,50,5,12,1500,3,Kerala,D1,Flood,\n");
        body.push_str("11,76,50,5,12,1500,3,Kerala,D1,Flood,NA\n");
        let data = write_csv(&dir, &body);

        let report = TrainingProcedure::new(small_options(&dir, data))
            .run()
            .unwrap();

        assert_eq!(report.n_rows_loaded, 32);
        assert_eq!(report.n_rows_dropped, 2);
        assert_eq!(report.n_train + report.n_test, 30);
    }

    #[test]
    fn test_unmapped_labels_fail_at_encode_stage() {
        let dir = TempDir::new().unwrap();
        let mut body = rows(30);
        body.push_str("11,76,50,5,12,1500,3,Kerala,D1,Flood,Severe\n");
        let data = write_csv(&dir, &body);
        let mut procedure = TrainingProcedure::new(small_options(&dir, data));

        match procedure.run() {
            Err(AppError::Data { offenders, .. }) => assert_eq!(offenders, vec!["Severe"]),
            other => panic!("expected data error, got {:?}", other),
        }
        assert_eq!(procedure.stage(), TrainingStage::EncodeLabels);
        assert!(!dir.path().join("model.bin").exists());
    }

    #[test]
    fn test_non_numeric_cell_fails_schema_validation() {
        let dir = TempDir::new().unwrap();
        let mut body = rows(30);
        body.push_str("11,76,high ground,5,12,1500,3,Kerala,D1,Flood,Low\n");
        let data = write_csv(&dir, &body);
        let mut procedure = TrainingProcedure::new(small_options(&dir, data));

        match procedure.run() {
            Err(AppError::Data { offenders, .. }) => {
                assert_eq!(offenders, vec!["row 30 elevation_meters=high ground"]);
            }
            other => panic!("expected data error, got {:?}", other),
        }
        assert_eq!(procedure.stage(), TrainingStage::ValidateSchema);
    }

    #[test]
    fn test_non_numeric_offender_names_the_source_row() {
        let dir = TempDir::new().unwrap();
        let mut body = String::new();
        for _ in 0..5 {
            body.push_str("11,76,50,5,12,1500,3,Kerala,D1,Flood,\n");
        }
        body.push_str("11,76,50,5,12,1500,3,Kerala,D1,Flood,Low\n");
        body.push_str("11,76,high ground,5,12,1500,3,Kerala,D1,Flood,Low\n");
        body.push_str(&rows(30));
        let data = write_csv(&dir, &body);
        let mut procedure = TrainingProcedure::new(small_options(&dir, data));

        match procedure.run() {
            Err(AppError::Data { offenders, .. }) => {
                assert_eq!(offenders, vec!["row 6 elevation_meters=high ground"]);
            }
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_file_fails_at_load() {
        let dir = TempDir::new().unwrap();
        let data = write_csv(&dir, "");
        let mut procedure = TrainingProcedure::new(small_options(&dir, data));

        assert!(matches!(procedure.run(), Err(AppError::Data { .. })));
        assert_eq!(procedure.stage(), TrainingStage::LoadData);
    }

    #[test]
    fn test_invalid_params_fail_before_loading() {
        let dir = TempDir::new().unwrap();
        let options = TrainingOptions::new(dir.path().join("absent.csv"), dir.path().join("m.bin"))
            .with_params(BoostingParams {
                max_depth: 0,
                ..Default::default()
            });
        let mut procedure = TrainingProcedure::new(options);

        assert!(matches!(procedure.run(), Err(AppError::Configuration(_))));
        assert_eq!(procedure.stage(), TrainingStage::Pending);
    }
}
