//! Location enrichment: turns a coordinate into a full feature row.

use crate::error::Result;
use crate::models::{FeatureRow, FeatureValue};
use async_trait::async_trait;

/// Source of geographic features for a coordinate
#[async_trait]
pub trait GisLookup: Send + Sync + 'static {
    /// Lookup name for logs
    fn name(&self) -> &str;

    /// Build a feature row for `(lat, lon)`.
    ///
    /// Values in `overrides` win over looked-up ones; `lat` and `lon` always
    /// come from the arguments.
    async fn enrich(&self, lat: f64, lon: f64, overrides: FeatureRow) -> Result<FeatureRow>;
}

/// Fixed placeholder values standing in for a real GIS backend
#[derive(Debug, Clone)]
pub struct SimulatedGisLookup {
    defaults: Vec<(&'static str, FeatureValue)>,
}

impl SimulatedGisLookup {
    pub fn new() -> Self {
        Self {
            defaults: vec![
                ("elevation_meters", FeatureValue::Number(50.0)),
                ("dist_to_coast_km", FeatureValue::Number(10.0)),
                ("dist_to_major_river_km", FeatureValue::Number(5.0)),
                ("avg_annual_rainfall_mm", FeatureValue::Number(1800.0)),
                ("seismic_zone", FeatureValue::Number(3.0)),
                ("state", FeatureValue::Text("Tamil Nadu".to_string())),
                ("district", FeatureValue::Text("Chennai".to_string())),
                ("primary_hazard_type", FeatureValue::Text("Flood".to_string())),
            ],
        }
    }
}

impl Default for SimulatedGisLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GisLookup for SimulatedGisLookup {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn enrich(&self, lat: f64, lon: f64, overrides: FeatureRow) -> Result<FeatureRow> {
        let mut row = overrides;
        for (name, value) in &self.defaults {
            if !row.contains(name) {
                row.insert(*name, value.clone());
            }
        }
        row.insert("lat", lat);
        row.insert("lon", lon);

        tracing::debug!(lookup = self.name(), lat, lon, "Location enriched");
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::schema::FeatureSchema;

    #[tokio::test]
    async fn test_fills_every_schema_column() {
        let row = SimulatedGisLookup::new()
            .enrich(13.08, 80.27, FeatureRow::new())
            .await
            .unwrap();

        for name in FeatureSchema::canonical().feature_names() {
            assert!(row.contains(name), "missing {}", name);
        }
        assert_eq!(row.get("lat"), Some(&FeatureValue::Number(13.08)));
        assert_eq!(
            row.get("state"),
            Some(&FeatureValue::Text("Tamil Nadu".to_string()))
        );
        assert_eq!(row.get("seismic_zone"), Some(&FeatureValue::Number(3.0)));
    }

    #[tokio::test]
    async fn test_overrides_win_except_coordinates() {
        let overrides = FeatureRow::new()
            .with("state", "Kerala")
            .with("elevation_meters", 2.5)
            .with("lat", 0.0);

        let row = SimulatedGisLookup::new()
            .enrich(9.93, 76.26, overrides)
            .await
            .unwrap();

        assert_eq!(row.get("state"), Some(&FeatureValue::Text("Kerala".to_string())));
        assert_eq!(row.get("elevation_meters"), Some(&FeatureValue::Number(2.5)));
        assert_eq!(row.get("lat"), Some(&FeatureValue::Number(9.93)));
    }
}
