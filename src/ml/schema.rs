use crate::models::{FeatureRow, FeatureValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;

/// Bump whenever the canonical column list changes
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the label column in training data
pub const TARGET_COLUMN: &str = "risk_level";

const NUMERIC_FEATURES: &[&str] = &[
    "lat",
    "lon",
    "elevation_meters",
    "dist_to_coast_km",
    "dist_to_major_river_km",
    "avg_annual_rainfall_mm",
    "seismic_zone",
];

const CATEGORICAL_FEATURES: &[&str] = &["state", "district", "primary_hazard_type"];

/// Kind of a feature column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Ordered input columns of the pipeline.
///
/// Numeric columns come first, then categorical columns; every downstream
/// step relies on this order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    numeric: Vec<String>,
    categorical: Vec<String>,
    target: String,
}

impl FeatureSchema {
    /// The schema every artifact of this build is fit against
    pub fn canonical() -> Self {
        Self {
            version: SCHEMA_VERSION,
            numeric: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            target: TARGET_COLUMN.to_string(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn numeric_features(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical_features(&self) -> &[String] {
        &self.categorical
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Ordered (name, kind) pairs
    pub fn columns(&self) -> impl Iterator<Item = (&str, FeatureKind)> {
        self.numeric
            .iter()
            .map(|n| (n.as_str(), FeatureKind::Numeric))
            .chain(
                self.categorical
                    .iter()
                    .map(|n| (n.as_str(), FeatureKind::Categorical)),
            )
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hex SHA-256 over version, ordered columns and target
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("v{}\n", self.version));
        for (name, kind) in self.columns() {
            hasher.update(format!("{}:{}\n", name, kind));
        }
        hasher.update(format!("target:{}\n", self.target));

        format!("{:x}", hasher.finalize())
    }

    /// Required columns absent from `header`, features in schema order, target last
    pub fn missing_columns<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        let present = |name: &str| header.iter().any(|h| h.as_ref().trim() == name);

        self.columns()
            .map(|(name, _)| name)
            .chain(std::iter::once(self.target.as_str()))
            .filter(|name| !present(*name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Re-project a row into schema order; absent columns become missing
    pub fn project(&self, row: &FeatureRow) -> ProjectedRow {
        let values = self
            .columns()
            .map(|(name, _)| row.get(name).cloned().unwrap_or(FeatureValue::Missing))
            .collect();

        ProjectedRow { values }
    }
}

/// A row laid out in schema column order
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    values: Vec<FeatureValue>,
}

impl ProjectedRow {
    /// Build directly from values already in schema order
    pub(crate) fn from_ordered(values: Vec<FeatureValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
