use aegis_risk::{
    config::Config,
    gis::{GisLookup, SimulatedGisLookup},
    ml::{PipelineArtifact, RiskPredictor, TrainingOptions, TrainingProcedure},
    models::{FeatureRow, FeatureValue},
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "aegis-risk-cli")]
#[command(about = "Aegis risk pipeline CLI", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a pipeline artifact from a labeled CSV
    Train {
        /// Training CSV (defaults to training.data_path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Artifact destination (defaults to model.artifact_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        test_size: Option<f64>,

        #[arg(long)]
        n_estimators: Option<usize>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,
    },

    /// Assess one location against an artifact
    Predict {
        /// Artifact to load (defaults to model.artifact_path)
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Feature override as name=value; repeatable
        #[arg(short, long = "feature", value_name = "NAME=VALUE", value_parser = parse_feature)]
        features: Vec<(String, FeatureValue)>,
    },

    /// Print the metadata of an artifact
    Inspect {
        #[arg(short, long)]
        artifact: Option<PathBuf>,
    },
}

fn parse_feature(raw: &str) -> Result<(String, FeatureValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty feature name in '{}'", raw));
    }
    Ok((name.to_string(), FeatureValue::from_cell(value)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "aegis_risk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    match cli.command {
        Commands::Train {
            data,
            output,
            seed,
            test_size,
            n_estimators,
            max_depth,
            learning_rate,
        } => {
            let mut options = TrainingOptions::from(&config);
            if let Some(data) = data {
                options.data_path = data;
            }
            if let Some(output) = output {
                options.artifact_path = output;
            }
            if let Some(seed) = seed {
                options.seed = seed;
            }
            if let Some(test_size) = test_size {
                options.test_size = test_size;
            }
            if let Some(n) = n_estimators {
                options.params.n_estimators = n;
            }
            if let Some(depth) = max_depth {
                options.params.max_depth = depth;
            }
            if let Some(lr) = learning_rate {
                options.params.learning_rate = lr;
            }

            let mut procedure = TrainingProcedure::new(options);
            let report = match procedure.run() {
                Ok(report) => report,
                Err(e) => bail!("training failed at stage {}: {}", procedure.stage(), e),
            };

            println!("Artifact written to {}", report.artifact_path.display());
            println!(
                "Rows: {} loaded, {} dropped, {} train, {} test",
                report.n_rows_loaded, report.n_rows_dropped, report.n_train, report.n_test
            );
            match &report.test_metrics {
                Some(metrics) => println!("{}", serde_json::to_string_pretty(metrics)?),
                None => println!("No held-out metrics (empty test split)"),
            }
        }

        Commands::Predict {
            artifact,
            lat,
            lon,
            features,
        } => {
            let path = artifact.unwrap_or(config.model.artifact_path);
            let predictor = RiskPredictor::load(&path);

            let overrides: FeatureRow = features.into_iter().collect();
            let row = SimulatedGisLookup::new().enrich(lat, lon, overrides).await?;
            let assessment = predictor.assess(&row)?;

            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }

        Commands::Inspect { artifact } => {
            let path = artifact.unwrap_or(config.model.artifact_path);
            let artifact = PipelineArtifact::load(&path)
                .with_context(|| format!("cannot inspect '{}'", path.display()))?;

            println!("{}", serde_json::to_string_pretty(artifact.metadata())?);
        }
    }

    Ok(())
}
