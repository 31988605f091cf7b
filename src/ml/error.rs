//! Error types for pipeline artifact persistence

use std::path::PathBuf;

/// Result type for artifact operations
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;

/// Reasons a pipeline artifact cannot be written or used
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// No artifact at the configured location
    #[error("no artifact found at '{}'", .path.display())]
    NotFound { path: PathBuf },

    /// Filesystem failure while reading or writing
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bytes present but not a readable artifact
    #[error("corrupt artifact at '{}': {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Written by an incompatible version of the pipeline
    #[error("incompatible artifact format version {found}, expected {expected}")]
    IncompatibleFormat { found: u32, expected: u32 },

    /// Trained against a different feature schema
    #[error("artifact schema {found} does not match expected schema {expected}")]
    SchemaMismatch { expected: String, found: String },

    /// Serving without an artifact
    #[error("pipeline artifact not loaded: {reason}")]
    NotLoaded { reason: String },

    /// Artifact could not be encoded
    #[error("failed to encode artifact: {0}")]
    Encode(String),
}

impl ArtifactError {
    /// Short machine-friendly reason, used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactError::NotFound { .. } => "not_found",
            ArtifactError::Io { .. } => "io",
            ArtifactError::Corrupt { .. } => "corrupt",
            ArtifactError::IncompatibleFormat { .. } => "incompatible_format",
            ArtifactError::SchemaMismatch { .. } => "schema_mismatch",
            ArtifactError::NotLoaded { .. } => "not_loaded",
            ArtifactError::Encode(_) => "encode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_messages_name_the_path() {
        let err = ArtifactError::NotFound {
            path: PathBuf::from("artifacts/model.bin"),
        };
        assert_eq!(err.to_string(), "no artifact found at 'artifacts/model.bin'");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_converts_into_app_error() {
        let err: AppError = ArtifactError::IncompatibleFormat {
            found: 9,
            expected: 1,
        }
        .into();
        assert_eq!(err.error_code(), "ARTIFACT_UNAVAILABLE");
        assert!(err.to_string().contains("format version 9"));
    }
}
