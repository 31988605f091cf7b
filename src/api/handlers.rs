use crate::api::AppState;
use crate::error::Result;
use crate::metrics::gather_metrics;
use crate::models::{Assessment, FeatureRow};
use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

/// Liveness banner
pub async fn root() -> Json<Value> {
    Json(json!({ "status": "Aegis risk service is running" }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let predictor = &state.predictor;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        model_loaded: predictor.is_loaded(),
        schema_fingerprint: predictor
            .artifact()
            .map(|a| a.schema_fingerprint().to_string()),
        degraded_reason: predictor.unavailable_reason().map(|r| r.to_string()),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

/// Assess the disaster risk of a location
pub async fn predict_risk(
    State(state): State<AppState>,
    Json(request): Json<PredictRiskRequest>,
) -> Result<Json<Assessment>> {
    request.validate()?;

    let row = state
        .gis
        .enrich(request.lat, request.lon, request.features)
        .await?;
    let assessment = state.predictor.assess(&row)?;

    Ok(Json(assessment))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRiskRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,

    /// Known feature values; the GIS lookup fills the rest
    #[serde(default)]
    pub features: FeatureRow,
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}
