/// Risk classification pipeline
///
/// Training turns a labeled CSV into a single pipeline artifact; serving
/// loads that artifact once and reuses it for every request:
/// - Canonical feature schema and row projection
/// - Imputation, standardization and one-hot encoding
/// - Exhaustive risk label codec
/// - Gradient boosted tree classifier
/// - Checksummed artifact persistence
/// - Degraded-mode inference when the artifact is unusable
pub mod artifact;
pub mod classifier;
pub mod dataset;
pub mod error;
pub mod features;
pub mod labels;
pub mod models;
pub mod schema;
pub mod service;
pub mod training;

pub use artifact::{ArtifactMetadata, PipelineArtifact, RiskPrediction};
pub use classifier::{Classifier, GradientBoostingClassifier};
pub use dataset::RawTable;
pub use error::{ArtifactError, ArtifactResult};
pub use features::Preprocessor;
pub use labels::LabelCodec;
pub use models::{BoostingParams, ModelMetrics, TrainTestSplit, TrainingDataset};
pub use schema::{FeatureKind, FeatureSchema, ProjectedRow};
pub use service::{RiskPredictor, FALLBACK_RISK_LEVEL, LIVE_RATIONALE};
pub use training::{TrainingOptions, TrainingProcedure, TrainingReport, TrainingStage};
