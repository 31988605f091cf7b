use crate::error::{AppError, Result};
use crate::ml::models::BoostingParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Pipeline artifact location
    pub model: ModelConfig,

    /// Training run defaults
    pub training: TrainingConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("AEGIS_CONFIG_PATH").unwrap_or_else(|_| "config/aegis.toml".to_string());

        Self::load_from(&config_path)
    }

    /// Load the embedded defaults, then `config_path` if it exists, then the environment
    pub fn load_from(config_path: &str) -> Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: AEGIS__)
            .add_source(
                config::Environment::with_prefix("AEGIS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.training.test_size > 0.0 && self.training.test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "training.test_size must be in (0, 1), got {}",
                self.training.test_size
            )));
        }
        self.training.boosting.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Labeled CSV with the feature schema columns
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Held-out fraction
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the train/test shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub boosting: BoostingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("artifacts/aegis_risk_model.bin")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/india_district_level_10per.csv")
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
