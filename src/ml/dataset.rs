use crate::error::{AppError, Result};
use crate::ml::schema::{FeatureSchema, ProjectedRow};
use crate::models::FeatureValue;
use std::io::Read;
use std::path::Path;

/// Tabular training source, kept as raw text cells
#[derive(Debug, Clone)]
pub struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Load a CSV file with a header row
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::data(
                format!("training data not found at '{}'", path.display()),
                vec![],
            ));
        }

        let file = std::fs::File::open(path).map_err(|e| {
            AppError::data(
                format!("failed to open training data '{}': {}", path.display(), e),
                vec![],
            )
        })?;

        Self::from_csv_reader(file)
    }

    /// Load CSV from any reader with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()
            .map_err(|e| AppError::data(format!("unparsable CSV header: {}", e), vec![]))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| {
                AppError::data(format!("unparsable CSV record {}: {}", idx + 1, e), vec![])
            })?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// All cells of one column, in row order
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name).ok_or_else(|| {
            AppError::schema_mismatch("column not present in data", vec![name.to_string()])
        })?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(|c| c.as_str()).unwrap_or(""))
            .collect())
    }

    /// Project every row onto the schema column order
    pub fn project(&self, schema: &FeatureSchema) -> Result<Vec<ProjectedRow>> {
        let indices: Vec<usize> = schema
            .columns()
            .map(|(name, _)| {
                self.column_index(name).ok_or_else(|| {
                    AppError::schema_mismatch("column not present in data", vec![name.to_string()])
                })
            })
            .collect::<Result<_>>()?;

        Ok(self
            .rows
            .iter()
            .map(|row| {
                let values = indices
                    .iter()
                    .map(|&i| {
                        row.get(i)
                            .map(|cell| FeatureValue::from_cell(cell))
                            .unwrap_or(FeatureValue::Missing)
                    })
                    .collect();
                ProjectedRow::from_ordered(values)
            })
            .collect())
    }

    /// Keep only the given rows, in the given order
    pub fn select_rows(&self, keep: &[usize]) -> Self {
        Self {
            header: self.header.clone(),
            rows: keep
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}
