use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, GradientBoostingClassifier};
use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::ml::features::Preprocessor;
use crate::ml::labels::LabelCodec;
use crate::ml::models::{BoostingParams, ModelMetrics};
use crate::ml::schema::{FeatureSchema, SCHEMA_VERSION};
use crate::models::{FeatureRow, RiskLevel};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Leading bytes of every artifact file
pub const ARTIFACT_MAGIC: &[u8; 8] = b"AEGISRSK";

/// Version of the on-disk layout
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = ARTIFACT_MAGIC.len() + 4 + CHECKSUM_LEN;

/// Provenance of a trained artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub schema_version: u32,
    pub schema_fingerprint: String,

    /// Rows read from the training source
    pub n_rows_loaded: usize,

    /// Rows dropped for an empty target
    pub n_rows_dropped: usize,

    pub n_train: usize,
    pub n_test: usize,
    pub params: BoostingParams,
    pub train_metrics: Option<ModelMetrics>,

    /// Held-out metrics; absent when the test split is empty
    pub test_metrics: Option<ModelMetrics>,

    /// Names of the transformed vector components
    pub feature_names: Vec<String>,
}

/// Class decision for one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub risk_level: RiskLevel,

    /// Probability of the chosen class
    pub confidence: f64,

    pub probabilities: BTreeMap<String, f64>,
}

/// A fitted preprocessor paired with the classifier trained on its output
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    metadata: ArtifactMetadata,
    preprocessor: Preprocessor,
    classifier: GradientBoostingClassifier,
}

impl PipelineArtifact {
    pub fn new(
        metadata: ArtifactMetadata,
        preprocessor: Preprocessor,
        classifier: GradientBoostingClassifier,
    ) -> Result<Self> {
        let artifact = Self {
            metadata,
            preprocessor,
            classifier,
        };
        artifact
            .check_consistency()
            .map_err(|reason| AppError::Internal(format!("inconsistent pipeline: {}", reason)))?;
        Ok(artifact)
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &GradientBoostingClassifier {
        &self.classifier
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.preprocessor.schema()
    }

    pub fn schema_fingerprint(&self) -> &str {
        &self.metadata.schema_fingerprint
    }

    fn check_consistency(&self) -> std::result::Result<(), String> {
        if !self.preprocessor.is_fitted() {
            return Err("preprocessor is not fitted".to_string());
        }
        if !self.classifier.is_consistent() {
            return Err("classifier is untrained or malformed".to_string());
        }
        if self.preprocessor.n_features() != self.classifier.n_features() {
            return Err(format!(
                "preprocessor emits {} features but classifier expects {}",
                self.preprocessor.n_features(),
                self.classifier.n_features()
            ));
        }
        if self.classifier.n_classes() != LabelCodec::N_CLASSES {
            return Err(format!(
                "classifier has {} classes, expected {}",
                self.classifier.n_classes(),
                LabelCodec::N_CLASSES
            ));
        }
        if self.preprocessor.schema().fingerprint() != self.metadata.schema_fingerprint {
            return Err("metadata fingerprint disagrees with preprocessor schema".to_string());
        }
        Ok(())
    }

    /// Write the artifact, replacing any file already at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ArtifactResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = temp_sibling(path);
        std::fs::write(&tmp, &bytes).map_err(|source| ArtifactError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            fingerprint = %self.metadata.schema_fingerprint,
            "Pipeline artifact saved"
        );
        Ok(())
    }

    /// Read an artifact written by `save`
    pub fn load<P: AsRef<Path>>(path: P) -> ArtifactResult<Self> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_bytes(&bytes, path)
    }

    fn to_bytes(&self) -> ArtifactResult<Vec<u8>> {
        let payload = bincode::serialize(self).map_err(|e| ArtifactError::Encode(e.to_string()))?;
        let checksum = Sha256::digest(&payload);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(ARTIFACT_MAGIC);
        bytes.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&checksum);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8], path: &Path) -> ArtifactResult<Self> {
        let corrupt = |reason: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!(
                "file is {} bytes, shorter than the {} byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let (magic, rest) = bytes.split_at(ARTIFACT_MAGIC.len());
        if magic != ARTIFACT_MAGIC {
            return Err(corrupt("bad magic bytes".to_string()));
        }

        let (version, rest) = rest.split_at(4);
        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(version);
        let version = u32::from_le_bytes(version_bytes);
        if version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::IncompatibleFormat {
                found: version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        let (checksum, payload) = rest.split_at(CHECKSUM_LEN);
        if Sha256::digest(payload).as_slice() != checksum {
            return Err(corrupt("checksum mismatch".to_string()));
        }

        let artifact: PipelineArtifact = bincode::deserialize(payload)
            .map_err(|e| corrupt(format!("undecodable payload: {}", e)))?;

        let expected = FeatureSchema::canonical();
        if artifact.metadata.schema_version != SCHEMA_VERSION
            || artifact.metadata.schema_fingerprint != expected.fingerprint()
        {
            return Err(ArtifactError::SchemaMismatch {
                expected: format!("v{}/{}", SCHEMA_VERSION, expected.fingerprint()),
                found: format!(
                    "v{}/{}",
                    artifact.metadata.schema_version, artifact.metadata.schema_fingerprint
                ),
            });
        }

        artifact.check_consistency().map_err(corrupt)?;

        tracing::debug!(
            path = %path.display(),
            created_at = %artifact.metadata.created_at,
            "Pipeline artifact loaded"
        );
        Ok(artifact)
    }

    /// Project, transform, classify and decode one row
    pub fn predict_row(&self, row: &FeatureRow) -> Result<RiskPrediction> {
        let mut predictions = self.predict_rows(std::slice::from_ref(row))?;
        predictions
            .pop()
            .ok_or_else(|| AppError::Internal("no prediction produced".to_string()))
    }

    /// Batch form of `predict_row`; errors name the row's batch index
    pub fn predict_rows(&self, rows: &[FeatureRow]) -> Result<Vec<RiskPrediction>> {
        let schema = self.preprocessor.schema();
        let projected: Vec<_> = rows.iter().map(|row| schema.project(row)).collect();
        let features: Array2<f64> = self.preprocessor.transform_batch(&projected)?;
        let proba = self.classifier.predict_proba(&features)?;

        let codec = LabelCodec::new();
        let class_names = self.classifier.class_names();

        proba
            .axis_iter(Axis(0))
            .map(|row| {
                let (index, confidence) = row.iter().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |best, (idx, &p)| if p > best.1 { (idx, p) } else { best },
                );

                let probabilities = class_names
                    .iter()
                    .cloned()
                    .zip(row.iter().copied())
                    .collect();

                Ok(RiskPrediction {
                    risk_level: codec.decode(index)?,
                    confidence,
                    probabilities,
                })
            })
            .collect()
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
