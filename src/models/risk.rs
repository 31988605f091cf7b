use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Coarse disaster-risk category
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString,
    EnumIter, Display,
)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How an assessment was produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionMode {
    /// Output of the loaded pipeline artifact
    Model,

    /// Fixed fallback; the pipeline could not be used
    Degraded,
}

/// Risk category plus the rationale shown to operators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub risk_level: RiskLevel,
    pub risk_reason: String,
    pub mode: PredictionMode,

    /// Probability of the chosen class; absent in degraded mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Assessment {
    pub fn is_degraded(&self) -> bool {
        self.mode == PredictionMode::Degraded
    }
}
