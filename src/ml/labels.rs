use crate::error::{AppError, Result};
use crate::models::RiskLevel;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Fixed bijection between risk levels and class indices
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelCodec;

impl LabelCodec {
    /// Number of classes the classifier is trained on
    pub const N_CLASSES: usize = 3;

    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }

    /// Decode a class index; anything outside 0..3 is a fatal mismatch
    pub fn decode(&self, index: usize) -> Result<RiskLevel> {
        match index {
            0 => Ok(RiskLevel::Low),
            1 => Ok(RiskLevel::Medium),
            2 => Ok(RiskLevel::High),
            other => Err(AppError::LabelMismatch(other)),
        }
    }

    pub fn parse(&self, label: &str) -> Option<RiskLevel> {
        RiskLevel::from_str(label.trim()).ok()
    }

    /// Encode raw label cells, rejecting the batch if any value is unmapped.
    ///
    /// The error lists every distinct offending value, sorted.
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        let mut encoded = Vec::with_capacity(labels.len());
        let mut unmapped = BTreeSet::new();

        for label in labels {
            match self.parse(label.as_ref()) {
                Some(level) => encoded.push(self.encode(level)),
                None => {
                    unmapped.insert(label.as_ref().trim().to_string());
                }
            }
        }

        if !unmapped.is_empty() {
            return Err(AppError::data(
                "unmapped risk_level values",
                unmapped.into_iter().collect(),
            ));
        }

        Ok(encoded)
    }

    /// Class names in index order
    pub fn class_names(&self) -> Vec<String> {
        (0..Self::N_CLASSES)
            .filter_map(|i| self.decode(i).ok())
            .map(|level| level.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_round_trip_for_every_level() {
        let codec = LabelCodec::new();
        for level in RiskLevel::iter() {
            assert_eq!(codec.decode(codec.encode(level)).unwrap(), level);
        }
    }

    #[test]
    fn test_fixed_mapping() {
        let codec = LabelCodec::new();
        assert_eq!(codec.encode(RiskLevel::Low), 0);
        assert_eq!(codec.encode(RiskLevel::Medium), 1);
        assert_eq!(codec.encode(RiskLevel::High), 2);
    }

    #[test]
    fn test_decode_out_of_range_is_fatal() {
        let codec = LabelCodec::new();
        match codec.decode(3) {
            Err(AppError::LabelMismatch(3)) => {}
            other => panic!("expected label mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_all_enumerates_every_unmapped_value() {
        let codec = LabelCodec::new();
        let labels = vec!["Low", "Extreme", "High", "medium", "Extreme", " Medium "];

        match codec.encode_all(&labels) {
            Err(AppError::Data { offenders, .. }) => {
                assert_eq!(offenders, vec!["Extreme".to_string(), "medium".to_string()]);
            }
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_all_accepts_known_labels() {
        let codec = LabelCodec::new();
        let encoded = codec.encode_all(&["High", "Low", " Medium"]).unwrap();
        assert_eq!(encoded, vec![2, 0, 1]);
        assert_eq!(codec.class_names(), vec!["Low", "Medium", "High"]);
    }
}
