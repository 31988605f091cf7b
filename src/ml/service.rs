use crate::error::{AppError, Result};
use crate::metrics;
use crate::ml::artifact::{ArtifactMetadata, PipelineArtifact, RiskPrediction};
use crate::ml::error::ArtifactError;
use crate::models::{Assessment, FeatureRow, PredictionMode, RiskLevel};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Category served whenever the pipeline cannot be used
pub const FALLBACK_RISK_LEVEL: RiskLevel = RiskLevel::Medium;

/// Rationale attached to model-mode assessments
pub const LIVE_RATIONALE: &str = "Live model prediction based on location and simulated GIS data.";

#[derive(Debug, Clone)]
enum PredictorState {
    Loaded(Arc<PipelineArtifact>),
    Unavailable { reason: String, kind: &'static str },
}

/// Read-only inference handle over one pipeline artifact.
///
/// Built once at startup and shared behind an `Arc`; calls never mutate it.
#[derive(Debug, Clone)]
pub struct RiskPredictor {
    state: PredictorState,
}

impl RiskPredictor {
    /// Load the artifact at `path`; failures leave the predictor degraded
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match PipelineArtifact::load(path) {
            Ok(artifact) => {
                info!(
                    path = %path.display(),
                    fingerprint = %artifact.schema_fingerprint(),
                    created_at = %artifact.metadata().created_at,
                    "Risk model loaded"
                );
                Self::from_artifact(artifact)
            }
            Err(e) => {
                warn!(
                    mode = "degraded",
                    path = %path.display(),
                    error = %e,
                    "Risk model unavailable, serving fallback assessments"
                );
                Self::from_error(&e)
            }
        }
    }

    pub fn from_artifact(artifact: PipelineArtifact) -> Self {
        metrics::set_model_loaded(true);
        Self {
            state: PredictorState::Loaded(Arc::new(artifact)),
        }
    }

    pub fn from_error(error: &ArtifactError) -> Self {
        metrics::set_model_loaded(false);
        Self {
            state: PredictorState::Unavailable {
                reason: error.to_string(),
                kind: error.kind(),
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, PredictorState::Loaded(_))
    }

    pub fn artifact(&self) -> Option<&PipelineArtifact> {
        match &self.state {
            PredictorState::Loaded(artifact) => Some(artifact.as_ref()),
            PredictorState::Unavailable { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&ArtifactMetadata> {
        self.artifact().map(|a| a.metadata())
    }

    /// Why the predictor is degraded, if it is
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            PredictorState::Loaded(_) => None,
            PredictorState::Unavailable { reason, .. } => Some(reason.as_str()),
        }
    }

    /// Strict prediction; every failure is returned to the caller
    pub fn predict(&self, row: &FeatureRow) -> Result<RiskPrediction> {
        match &self.state {
            PredictorState::Loaded(artifact) => {
                let start = Instant::now();
                let prediction = artifact.predict_row(row)?;
                metrics::PREDICTION_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());
                Ok(prediction)
            }
            PredictorState::Unavailable { reason, .. } => Err(AppError::ArtifactUnavailable(
                ArtifactError::NotLoaded {
                    reason: reason.clone(),
                },
            )),
        }
    }

    /// Serving path: falls back to the fixed category when the artifact is
    /// unavailable or the row violates the schema
    pub fn assess(&self, row: &FeatureRow) -> Result<Assessment> {
        let assessment = match self.predict(row) {
            Ok(prediction) => Assessment {
                risk_level: prediction.risk_level,
                risk_reason: LIVE_RATIONALE.to_string(),
                mode: PredictionMode::Model,
                confidence: Some(prediction.confidence),
            },
            Err(AppError::ArtifactUnavailable(_)) => {
                let (reason, kind) = match &self.state {
                    PredictorState::Unavailable { reason, kind } => (reason.as_str(), *kind),
                    PredictorState::Loaded(_) => ("artifact rejected", "unknown"),
                };
                self.degraded(format!("ML model not loaded: {}", reason), kind)
            }
            Err(AppError::SchemaMismatch { message, columns }) => self.degraded(
                format!(
                    "Input does not match the model's feature schema ({}: {})",
                    message,
                    columns.join(", ")
                ),
                "schema_mismatch",
            ),
            Err(e) => return Err(e),
        };

        metrics::record_assessment(
            &assessment.mode.to_string(),
            &assessment.risk_level.to_string(),
        );
        debug!(
            mode = %assessment.mode,
            risk_level = %assessment.risk_level,
            "Risk assessed"
        );
        Ok(assessment)
    }

    fn degraded(&self, risk_reason: String, kind: &str) -> Assessment {
        metrics::record_degraded(kind);
        warn!(mode = "degraded", reason = %risk_reason, "Serving fallback risk assessment");

        Assessment {
            risk_level: FALLBACK_RISK_LEVEL,
            risk_reason,
            mode: PredictionMode::Degraded,
            confidence: None,
        }
    }
}
