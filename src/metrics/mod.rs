//! Prometheus metrics for the risk pipeline.
//!
//! Assessments are counted by mode so degraded serving is visible on
//! dashboards, next to training outcomes and HTTP traffic.
//!
//! # Example
//! ```no_run
//! use aegis_risk::metrics::RISK_ASSESSMENTS_TOTAL;
//!
//! RISK_ASSESSMENTS_TOTAL
//!     .with_label_values(&["model", "High"])
//!     .inc();
//! ```

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::time::Instant;

const NAMESPACE: &str = "aegis_risk";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Total number of risk assessments served
    ///
    /// Labels: mode, risk_level
    pub static ref RISK_ASSESSMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("risk_assessments_total", "Total number of risk assessments served")
            .namespace(NAMESPACE),
        &["mode", "risk_level"]
    ).expect("Failed to create RISK_ASSESSMENTS_TOTAL metric");

    /// Assessments that fell back to the fixed category
    ///
    /// Labels: reason
    pub static ref DEGRADED_ASSESSMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("degraded_assessments_total", "Total number of degraded risk assessments")
            .namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create DEGRADED_ASSESSMENTS_TOTAL metric");

    /// Time spent in project, transform and classify for one row
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Model prediction duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// 1 when a pipeline artifact is loaded, 0 in degraded mode
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a pipeline artifact is loaded")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    /// Training runs by outcome
    ///
    /// Labels: outcome
    pub static ref TRAINING_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("training_runs_total", "Total number of training runs")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create TRAINING_RUNS_TOTAL metric");

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");
}

fn register<C>(collector: &C) -> Result<(), prometheus::Error>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    match PROMETHEUS_REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register every metric with the global registry; safe to call repeatedly
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(&*RISK_ASSESSMENTS_TOTAL)?;
    register(&*DEGRADED_ASSESSMENTS_TOTAL)?;
    register(&*PREDICTION_DURATION_SECONDS)?;
    register(&*MODEL_LOADED)?;
    register(&*TRAINING_RUNS_TOTAL)?;
    register(&*HTTP_REQUESTS_TOTAL)?;
    register(&*HTTP_REQUEST_DURATION_SECONDS)?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

pub fn record_assessment(mode: &str, risk_level: &str) {
    RISK_ASSESSMENTS_TOTAL
        .with_label_values(&[mode, risk_level])
        .inc();
}

pub fn record_degraded(reason: &str) {
    DEGRADED_ASSESSMENTS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_training(outcome: &str) {
    TRAINING_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_model_loaded(loaded: bool) {
    MODEL_LOADED.set(if loaded { 1.0 } else { 0.0 });
}

/// axum middleware counting requests by matched route
pub async fn track_http(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

    response
}
