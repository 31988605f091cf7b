use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tokens treated as an absent cell
const MISSING_TOKENS: &[&str] = &["na", "n/a", "nan", "null", "none"];

/// Raw value of a single feature cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FeatureValue {
    /// Parse a raw CSV/CLI cell, keeping it as text
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if is_missing_token(trimmed) {
            FeatureValue::Missing
        } else {
            FeatureValue::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            FeatureValue::Missing => true,
            FeatureValue::Number(n) => n.is_nan(),
            FeatureValue::Text(s) => is_missing_token(s.trim()),
        }
    }

    /// Numeric reading of the value.
    ///
    /// `Ok(None)` is a missing value; `Err` carries the text that is not a number.
    pub fn as_number(&self) -> std::result::Result<Option<f64>, String> {
        if self.is_missing() {
            return Ok(None);
        }
        match self {
            FeatureValue::Number(n) if n.is_finite() => Ok(Some(*n)),
            FeatureValue::Number(n) => Err(n.to_string()),
            FeatureValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(s.clone()),
            },
            FeatureValue::Missing => Ok(None),
        }
    }

    /// Categorical reading of the value; `None` when missing.
    ///
    /// Numeric text renders like a number, so a CSV cell `3.0` and a JSON
    /// number `3.0` land in the same category.
    pub fn as_category(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            FeatureValue::Text(s) => {
                let s = s.trim();
                match s.parse::<f64>() {
                    Ok(n) if n.is_finite() => Some(render_number(n)),
                    _ => Some(s.to_string()),
                }
            }
            FeatureValue::Number(n) => Some(render_number(*n)),
            FeatureValue::Missing => None,
        }
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn is_missing_token(s: &str) -> bool {
    s.is_empty() || MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Number(value as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

/// One prediction subject: feature name to raw value, in no particular order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRow {
    values: HashMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
