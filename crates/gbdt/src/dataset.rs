//! Fixed-point training data
//!
//! Real-valued inputs are quantized to integers at [`SCALE`] before any tree
//! sees them. The conversion is the only place floats enter the crate.

use crate::errors::TrainerError;
use crate::model::SCALE;

/// Quantize a real value to fixed-point, `None` for NaN or infinities
///
/// Values beyond the i64 range saturate.
pub fn to_fixed(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    Some((value * SCALE as f64).round() as i64)
}

/// Map a fixed-point value back to a real number
pub fn from_fixed(value: i64) -> f64 {
    value as f64 / SCALE as f64
}

/// Training matrix with one fixed-point target per row
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<i64>>,
    pub targets: Vec<i64>,
    pub feature_count: usize,
}

impl Dataset {
    /// Build from fixed-point rows, checking alignment and width
    pub fn new(features: Vec<Vec<i64>>, targets: Vec<i64>) -> Result<Self, TrainerError> {
        if features.len() != targets.len() {
            return Err(TrainerError::Dataset(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }

        let feature_count = features.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != feature_count)
        {
            return Err(TrainerError::Dataset(format!(
                "Row {i}: expected {feature_count} features, got {}",
                row.len()
            )));
        }

        Ok(Self {
            features,
            targets,
            feature_count,
        })
    }

    /// Quantize a real-valued matrix and label vector
    pub fn from_real(features: &[Vec<f64>], targets: &[f64]) -> Result<Self, TrainerError> {
        let fixed_rows = features
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, &v)| {
                        to_fixed(v).ok_or_else(|| {
                            TrainerError::Dataset(format!(
                                "Row {i}, column {j}: non-finite value {v}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fixed_targets = targets
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                to_fixed(t)
                    .ok_or_else(|| TrainerError::Dataset(format!("Row {i}: non-finite target {t}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(fixed_rows, fixed_targets)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Per-feature (min, max), for logging
    pub fn feature_stats(&self) -> Vec<(i64, i64)> {
        let mut stats = vec![(i64::MAX, i64::MIN); self.feature_count];
        for row in &self.features {
            for (slot, &val) in stats.iter_mut().zip(row) {
                slot.0 = slot.0.min(val);
                slot.1 = slot.1.max(val);
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_conversion() {
        assert_eq!(to_fixed(0.85), Some(850_000));
        assert_eq!(to_fixed(-2.0), Some(-2 * SCALE));
        assert_eq!(to_fixed(f64::NAN), None);
        assert_eq!(to_fixed(f64::INFINITY), None);
        assert_eq!(to_fixed(1e300), Some(i64::MAX));
        assert!((from_fixed(850_000) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_from_real() {
        let ds = Dataset::from_real(&[vec![1.0, 0.5], vec![2.0, 0.25]], &[0.9, 0.1]).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.feature_count, 2);
        assert_eq!(ds.features[1], vec![2 * SCALE, 250_000]);
        assert_eq!(ds.targets, vec![900_000, 100_000]);
        assert_eq!(ds.feature_stats(), vec![(SCALE, 2 * SCALE), (250_000, 500_000)]);
    }

    #[test]
    fn test_rejects_misaligned_and_ragged() {
        assert!(Dataset::new(vec![vec![1]], vec![]).is_err());
        assert!(Dataset::new(vec![vec![1, 2], vec![3]], vec![0, 0]).is_err());
        assert!(Dataset::from_real(&[vec![f64::NAN]], &[0.0]).is_err());
        assert!(Dataset::from_real(&[vec![1.0]], &[f64::INFINITY]).is_err());
    }
}
