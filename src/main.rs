use aegis_risk::{
    api::{build_router, AppState},
    config::{Config, ObservabilityConfig},
    gis::SimulatedGisLookup,
    ml::RiskPredictor,
};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("aegis_risk={},tower_http=info", observability.log_level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(&config.observability);
    config.validate().context("invalid configuration")?;

    tracing::info!("Starting Aegis risk service v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = aegis_risk::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load the pipeline once; a missing artifact leaves the service degraded
    let predictor = Arc::new(RiskPredictor::load(&config.model.artifact_path));
    if !predictor.is_loaded() {
        tracing::warn!(
            mode = "degraded",
            "Every assessment will return the fallback category until an artifact is trained"
        );
    }

    let state = AppState::new(predictor, Arc::new(SimulatedGisLookup::new()));
    let app = build_router(state, &config.server.allowed_origins);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Risk assessment: http://{}/predict_risk", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("Aegis risk service stopped");
    Ok(())
}
