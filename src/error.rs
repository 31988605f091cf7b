use crate::ml::error::ArtifactError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing training data, unmapped labels
    #[error("Data error: {message}{}", format_offenders(.offenders))]
    Data {
        message: String,
        offenders: Vec<String>,
    },

    /// Columns disagree with the feature schema
    #[error("Schema mismatch: {message}{}", format_offenders(.columns))]
    SchemaMismatch { message: String, columns: Vec<String> },

    /// Pipeline artifact missing, corrupt or incompatible
    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(#[from] ArtifactError),

    /// Failure inside classifier fit/predict
    #[error("Classifier error{}: {message}", format_row(.row))]
    Classifier { row: Option<usize>, message: String },

    /// Classifier emitted a class index the label codec does not know
    #[error("Label mismatch: class index {0} has no risk level")]
    LabelMismatch(usize),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_offenders(items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!(" [{}]", items.join(", "))
    }
}

fn format_row(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" at row {}", row),
        None => String::new(),
    }
}

impl AppError {
    pub fn data(message: impl Into<String>, offenders: Vec<String>) -> Self {
        AppError::Data {
            message: message.into(),
            offenders,
        }
    }

    pub fn schema_mismatch(message: impl Into<String>, columns: Vec<String>) -> Self {
        AppError::SchemaMismatch {
            message: message.into(),
            columns,
        }
    }

    pub fn classifier(row: Option<usize>, message: impl Into<String>) -> Self {
        AppError::Classifier {
            row,
            message: message.into(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Data { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ArtifactUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Classifier { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LabelMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Data { .. } => "DATA_ERROR",
            AppError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            AppError::ArtifactUnavailable(_) => "ARTIFACT_UNAVAILABLE",
            AppError::Classifier { .. } => "CLASSIFIER_ERROR",
            AppError::LabelMismatch(_) => "LABEL_MISMATCH",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Validation("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::schema_mismatch("test", vec![]).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::LabelMismatch(7).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::data("bad", vec![]).error_code(), "DATA_ERROR");
        assert_eq!(
            AppError::classifier(Some(3), "nan").error_code(),
            "CLASSIFIER_ERROR"
        );
        assert_eq!(AppError::LabelMismatch(4).error_code(), "LABEL_MISMATCH");
    }

    #[test]
    fn test_messages_enumerate_offenders() {
        let err = AppError::data(
            "unmapped risk_level values",
            vec!["Extreme".to_string(), "low".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Data error: unmapped risk_level values [Extreme, low]"
        );

        let err = AppError::classifier(Some(12), "non-finite feature value");
        assert_eq!(
            err.to_string(),
            "Classifier error at row 12: non-finite feature value"
        );
    }
}
