use crate::error::{AppError, Result};
use crate::ml::schema::{FeatureSchema, ProjectedRow};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fill value for absent categorical cells
pub const MISSING_CATEGORY: &str = "missing";

/// Frozen statistics of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub name: String,

    /// Imputation value for missing cells
    pub median: f64,

    /// Mean of the imputed training column
    pub mean: f64,

    /// Population standard deviation of the imputed training column
    pub std: f64,
}

impl NumericStats {
    /// Divisor used for standardization; constant columns scale by 1
    pub fn scale(&self) -> f64 {
        if self.std <= f64::EPSILON {
            1.0
        } else {
            self.std
        }
    }

    fn apply(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.median) - self.mean) / self.scale()
    }
}

/// Frozen category list of one categorical column, sorted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub name: String,
    pub categories: Vec<String>,
}

impl CategoryVocabulary {
    fn position(&self, category: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(category))
            .ok()
    }
}

/// Imputation, standardization and one-hot encoding over the feature schema.
///
/// Fit once on the training split; `transform` is a pure function of a row
/// and the frozen parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    schema: FeatureSchema,
    numeric: Vec<NumericStats>,
    categorical: Vec<CategoryVocabulary>,
    n_features: usize,
    is_fitted: bool,
}

impl Preprocessor {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            numeric: Vec::new(),
            categorical: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    /// Validate that every numeric cell parses, listing all offenders at once.
    ///
    /// Rows come paired with the index reported for them, so callers holding a
    /// filtered table can still point at the source row.
    pub fn check_numeric_cells<'a, I>(schema: &FeatureSchema, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, &'a ProjectedRow)>,
    {
        let mut offenders = Vec::new();

        for (row_idx, row) in rows {
            for (col, name) in schema.numeric_features().iter().enumerate() {
                if let Some(Err(text)) = row.values().get(col).map(|v| v.as_number()) {
                    offenders.push(format!("row {} {}={}", row_idx, name, text));
                }
            }
        }

        if offenders.is_empty() {
            Ok(())
        } else {
            Err(AppError::data(
                "non-numeric values in numeric columns",
                offenders,
            ))
        }
    }

    /// Learn medians, means, deviations and category lists from training rows
    pub fn fit(&mut self, rows: &[ProjectedRow]) -> Result<()> {
        if rows.is_empty() {
            return Err(AppError::data("cannot fit preprocessor on zero rows", vec![]));
        }
        self.check_widths(rows)?;
        Self::check_numeric_cells(&self.schema, rows.iter().enumerate())?;

        let n_numeric = self.schema.numeric_features().len();

        let mut numeric = Vec::with_capacity(n_numeric);
        let mut empty_columns = Vec::new();

        for (col, name) in self.schema.numeric_features().iter().enumerate() {
            let observed: Vec<Option<f64>> = rows
                .iter()
                .map(|row| row.values()[col].as_number().ok().flatten())
                .collect();

            let Some(median) = median_of(observed.iter().flatten().copied().collect()) else {
                empty_columns.push(name.clone());
                continue;
            };

            let imputed: Vec<f64> = observed.iter().map(|v| v.unwrap_or(median)).collect();
            let n = imputed.len() as f64;
            let mean = imputed.iter().sum::<f64>() / n;
            let variance = imputed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

            numeric.push(NumericStats {
                name: name.clone(),
                median,
                mean,
                std: variance.sqrt(),
            });
        }

        if !empty_columns.is_empty() {
            return Err(AppError::data(
                "numeric columns have no observed values in the training split",
                empty_columns,
            ));
        }

        let categorical: Vec<CategoryVocabulary> = self
            .schema
            .categorical_features()
            .iter()
            .enumerate()
            .map(|(offset, name)| {
                let categories: BTreeSet<String> = rows
                    .iter()
                    .map(|row| {
                        row.values()[n_numeric + offset]
                            .as_category()
                            .unwrap_or_else(|| MISSING_CATEGORY.to_string())
                    })
                    .collect();

                CategoryVocabulary {
                    name: name.clone(),
                    categories: categories.into_iter().collect(),
                }
            })
            .collect();

        self.n_features =
            numeric.len() + categorical.iter().map(|c| c.categories.len()).sum::<usize>();
        self.numeric = numeric;
        self.categorical = categorical;
        self.is_fitted = true;

        tracing::debug!(
            n_rows = rows.len(),
            n_features = self.n_features,
            "Preprocessor fitted"
        );

        Ok(())
    }

    /// Transform one projected row into its fixed-length vector
    pub fn transform(&self, row: &ProjectedRow) -> Result<Vec<f64>> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "Preprocessor must be fitted before transform".to_string(),
            ));
        }
        if row.len() != self.schema.len() {
            return Err(AppError::schema_mismatch(
                format!(
                    "row has {} columns, schema has {}",
                    row.len(),
                    self.schema.len()
                ),
                vec![],
            ));
        }

        let mut features = Vec::with_capacity(self.n_features);
        let mut bad_columns = Vec::new();

        for (col, stats) in self.numeric.iter().enumerate() {
            match row.values()[col].as_number() {
                Ok(value) => features.push(stats.apply(value)),
                Err(_) => bad_columns.push(stats.name.clone()),
            }
        }

        if !bad_columns.is_empty() {
            return Err(AppError::schema_mismatch(
                "non-numeric value for numeric feature",
                bad_columns,
            ));
        }

        let n_numeric = self.numeric.len();
        for (offset, vocab) in self.categorical.iter().enumerate() {
            let category = row.values()[n_numeric + offset]
                .as_category()
                .unwrap_or_else(|| MISSING_CATEGORY.to_string());

            let start = features.len();
            features.resize(start + vocab.categories.len(), 0.0);
            // Unseen categories leave the whole block at zero
            if let Some(pos) = vocab.position(&category) {
                features[start + pos] = 1.0;
            }
        }

        Ok(features)
    }

    /// Transform a batch into an (n_rows × n_features) matrix
    pub fn transform_batch(&self, rows: &[ProjectedRow]) -> Result<Array2<f64>> {
        let mut data = Vec::with_capacity(rows.len() * self.n_features);
        for row in rows {
            data.extend(self.transform(row)?);
        }

        Array2::from_shape_vec((rows.len(), self.n_features), data)
            .map_err(|e| AppError::Internal(format!("Failed to create feature array: {}", e)))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, rows: &[ProjectedRow]) -> Result<Array2<f64>> {
        self.fit(rows)?;
        self.transform_batch(rows)
    }

    fn check_widths(&self, rows: &[ProjectedRow]) -> Result<()> {
        match rows.iter().position(|r| r.len() != self.schema.len()) {
            Some(idx) => Err(AppError::schema_mismatch(
                format!(
                    "row {} has {} columns, schema has {}",
                    idx,
                    rows[idx].len(),
                    self.schema.len()
                ),
                vec![],
            )),
            None => Ok(()),
        }
    }

    /// Names of the transformed columns, e.g. `state=Kerala`
    pub fn output_feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| s.name.clone())
            .chain(self.categorical.iter().flat_map(|v| {
                v.categories
                    .iter()
                    .map(move |c| format!("{}={}", v.name, c))
            }))
            .collect()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn numeric_stats(&self, name: &str) -> Option<&NumericStats> {
        self.numeric.iter().find(|s| s.name == name)
    }

    pub fn categories(&self, name: &str) -> Option<&[String]> {
        self.categorical
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.categories.as_slice())
    }

    /// Get number of output features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

/// Median with midpoint interpolation; `None` for an empty input
fn median_of(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureRow, FeatureValue};

    fn district(lat: f64, elevation: Option<f64>, state: &str, hazard: &str) -> FeatureRow {
        let mut row = FeatureRow::new()
            .with("lat", lat)
            .with("lon", 78.0)
            .with("dist_to_coast_km", 10.0)
            .with("dist_to_major_river_km", 5.0)
            .with("avg_annual_rainfall_mm", 1200.0)
            .with("seismic_zone", 3.0)
            .with("state", state)
            .with("district", "Central")
            .with("primary_hazard_type", hazard);
        if let Some(e) = elevation {
            row.insert("elevation_meters", e);
        }
        row
    }

    fn fitted(rows: &[FeatureRow]) -> Preprocessor {
        let schema = FeatureSchema::canonical();
        let projected: Vec<ProjectedRow> = rows.iter().map(|r| schema.project(r)).collect();
        let mut pre = Preprocessor::new(schema);
        pre.fit(&projected).unwrap();
        pre
    }

    fn training_rows() -> Vec<FeatureRow> {
        vec![
            district(10.0, Some(100.0), "Kerala", "Flood"),
            district(20.0, Some(300.0), "Tamil Nadu", "Cyclone"),
            district(30.0, None, "Kerala", "Flood"),
            district(40.0, Some(500.0), "Gujarat", "Earthquake"),
        ]
    }

    #[test]
    fn test_median_of() {
        assert_eq!(median_of(vec![]), None);
        assert_eq!(median_of(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_of(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_fit_learns_frozen_statistics() {
        let pre = fitted(&training_rows());
        assert!(pre.is_fitted());

        let elevation = pre.numeric_stats("elevation_meters").unwrap();
        assert_eq!(elevation.median, 300.0);
        // imputed column: 100, 300, 300, 500
        assert_eq!(elevation.mean, 300.0);
        assert!((elevation.std - 20000.0_f64.sqrt()).abs() < 1e-9);

        let lat = pre.numeric_stats("lat").unwrap();
        assert_eq!(lat.mean, 25.0);

        assert_eq!(
            pre.categories("state").unwrap(),
            &["Gujarat", "Kerala", "Tamil Nadu"]
        );
        // 7 numeric + 3 states + 1 district + 3 hazards
        assert_eq!(pre.n_features(), 14);
        assert_eq!(pre.output_feature_names().len(), 14);
        assert_eq!(pre.output_feature_names()[7], "state=Gujarat");
    }

    #[test]
    fn test_missing_numeric_uses_training_median() {
        let pre = fitted(&training_rows());
        let schema = FeatureSchema::canonical();

        let a = pre
            .transform(&schema.project(&district(15.0, None, "Kerala", "Flood")))
            .unwrap();
        let b = pre
            .transform(&schema.project(&district(35.0, None, "Kerala", "Flood")))
            .unwrap();

        // elevation is column 2; median 300 equals the mean, so it standardizes to 0
        assert_eq!(a[2], 0.0);
        assert_eq!(a[2], b[2]);
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn test_unseen_category_yields_zero_block() {
        let pre = fitted(&training_rows());
        let schema = FeatureSchema::canonical();

        let row = district(15.0, Some(200.0), "Unknown Province", "Flood");
        let vector = pre.transform(&schema.project(&row)).unwrap();

        assert_eq!(vector.len(), pre.n_features());
        assert_eq!(&vector[7..10], &[0.0, 0.0, 0.0]);
        // hazard block still encodes Flood
        let hazards = pre.categories("primary_hazard_type").unwrap();
        let flood = hazards.iter().position(|h| h == "Flood").unwrap();
        assert_eq!(vector[11 + flood], 1.0);
    }

    #[test]
    fn test_csv_number_text_matches_json_number_category() {
        let rows: Vec<FeatureRow> = training_rows()
            .into_iter()
            .map(|mut r| {
                r.insert("district", FeatureValue::from_cell("3.0"));
                r
            })
            .collect();
        let pre = fitted(&rows);
        assert_eq!(pre.categories("district").unwrap(), &["3".to_string()]);

        let schema = FeatureSchema::canonical();
        let mut row = district(15.0, Some(200.0), "Kerala", "Flood");
        row.insert("district", 3.0);
        let vector = pre.transform(&schema.project(&row)).unwrap();

        let district_offset = 7 + pre.categories("state").unwrap().len();
        assert_eq!(vector[district_offset], 1.0);
    }

    #[test]
    fn test_missing_category_uses_sentinel() {
        let mut rows = training_rows();
        let mut no_state = district(50.0, Some(700.0), "ignored", "Flood");
        no_state.insert("state", FeatureValue::Missing);
        rows.push(no_state);

        let pre = fitted(&rows);
        assert!(pre
            .categories("state")
            .unwrap()
            .contains(&MISSING_CATEGORY.to_string()));
    }

    #[test]
    fn test_non_numeric_cell_fails_fit_with_all_offenders() {
        let schema = FeatureSchema::canonical();
        let mut rows = training_rows();
        rows[1].insert("lat", "north");
        rows[3].insert("seismic_zone", "IV");
        let projected: Vec<ProjectedRow> = rows.iter().map(|r| schema.project(r)).collect();

        let mut pre = Preprocessor::new(schema);
        match pre.fit(&projected) {
            Err(AppError::Data { offenders, .. }) => {
                assert_eq!(
                    offenders,
                    vec!["row 1 lat=north".to_string(), "row 3 seismic_zone=IV".to_string()]
                );
            }
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_at_transform_is_schema_mismatch() {
        let pre = fitted(&training_rows());
        let schema = FeatureSchema::canonical();
        let row = district(15.0, Some(200.0), "Kerala", "Flood").with("lon", "east");

        match pre.transform(&schema.project(&row)) {
            Err(AppError::SchemaMismatch { columns, .. }) => {
                assert_eq!(columns, vec!["lon".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let schema = FeatureSchema::canonical();
        let pre = Preprocessor::new(schema.clone());
        let row = schema.project(&training_rows()[0]);
        assert!(pre.transform(&row).is_err());
    }

    #[test]
    fn test_constant_column_scales_by_one() {
        let pre = fitted(&training_rows());
        let zone = pre.numeric_stats("seismic_zone").unwrap();
        assert_eq!(zone.std, 0.0);
        assert_eq!(zone.scale(), 1.0);

        let batch = pre
            .transform_batch(
                &training_rows()
                    .iter()
                    .map(|r| FeatureSchema::canonical().project(r))
                    .collect::<Vec<_>>(),
            )
            .unwrap();
        assert_eq!(batch.shape(), &[4, 14]);
        assert!(batch.column(6).iter().all(|&v| v == 0.0));
    }
}
