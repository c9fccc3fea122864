//! Candidate catalog
//!
//! The deduplicated universe of algorithm/parameter combinations. Building
//! the catalog fixes the column schema and fits the categorical encoder;
//! both stay unchanged for the lifetime of the recommender.

use crate::encoder::CategoricalEncoder;
use crate::errors::{RecommenderError, Result};
use crate::featurizer::{from_columns, to_columns, DecodedRow, ParamTable, SchemaMode};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One algorithm with one serialized parameter set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub algorithm: String,
    pub parameters: String,
}

impl Candidate {
    pub fn new(algorithm: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            parameters: parameters.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateCatalog {
    table: ParamTable,
    encoder: CategoricalEncoder,
    encoded: Vec<Vec<u32>>,
}

impl CandidateCatalog {
    /// Featurize, deduplicate and encode `candidates`
    pub fn new(candidates: &[Candidate]) -> Result<Self> {
        if candidates.is_empty() {
            return Err(RecommenderError::Configuration(
                "candidate catalog is empty".into(),
            ));
        }

        let table = to_columns(
            candidates
                .iter()
                .map(|c| (c.algorithm.as_str(), c.parameters.as_str())),
            SchemaMode::Establish,
        )?
        .dedup();
        let encoder = CategoricalEncoder::fit(&table);
        let encoded = encoder.transform(&table)?;

        info!(
            "Loaded {} ml/parameter combinations with {} parameters",
            table.len(),
            table.columns().len() - 1
        );

        Ok(Self {
            table,
            encoder,
            encoded,
        })
    }

    /// Sorted column names, `algorithm` included
    pub fn schema(&self) -> &[String] {
        self.table.columns()
    }

    pub fn table(&self) -> &ParamTable {
        &self.table
    }

    pub fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    /// Encoded rows, aligned with [`CandidateCatalog::table`]
    pub fn encoded(&self) -> &[Vec<u32>] {
        &self.encoded
    }

    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Draw `k` distinct row indices uniformly, `k` clamped to the catalog size
    pub fn sample<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<usize> {
        index::sample(rng, self.len(), k.min(self.len())).into_vec()
    }

    /// Encode external rows against the catalog schema and vocabulary
    pub fn encode<'r, I>(&self, rows: I) -> Result<Vec<Vec<u32>>>
    where
        I: IntoIterator<Item = (&'r str, &'r str)>,
    {
        let table = to_columns(rows, SchemaMode::Extend(self.schema()))?;
        self.encoder.transform(&table)
    }

    /// Decode catalog rows by index
    pub fn decode(&self, indices: &[usize]) -> Result<Vec<DecodedRow>> {
        let codes = indices
            .iter()
            .map(|&i| {
                self.encoded.get(i).cloned().ok_or_else(|| {
                    RecommenderError::InvalidArgument(format!(
                        "catalog index {i} out of range (size {})",
                        self.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        from_columns(&self.encoder.inverse_transform(&codes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new("SVC", "{'C': 1, 'kernel': 'rbf'}"),
            Candidate::new("SVC", "{'C': 1.0, 'kernel': 'rbf'}"),
            Candidate::new("SVC", "{'C': 10, 'kernel': 'linear'}"),
            Candidate::new("GaussianNB", "{}"),
        ]
    }

    #[test]
    fn test_dedup_and_schema() {
        let catalog = CandidateCatalog::new(&candidates()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.schema(), ["C", "algorithm", "kernel"]);
        assert_eq!(catalog.encoded().len(), catalog.table().len());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(
            CandidateCatalog::new(&[]),
            Err(RecommenderError::Configuration(_))
        ));
    }

    #[test]
    fn test_schema_stability() {
        let a = CandidateCatalog::new(&candidates()).unwrap();
        let b = CandidateCatalog::new(&candidates()).unwrap();
        assert_eq!(a.schema(), b.schema());
        assert_eq!(a.encoder(), b.encoder());
        assert_eq!(a.encoded(), b.encoded());
    }

    #[test]
    fn test_sample_is_distinct_and_clamped() {
        let catalog = CandidateCatalog::new(&candidates()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let two = catalog.sample(2, &mut rng);
        assert_eq!(two.len(), 2);
        assert_ne!(two[0], two[1]);

        let all = catalog.sample(50, &mut rng);
        assert_eq!(all.iter().collect::<HashSet<_>>().len(), 3);
    }

    #[test]
    fn test_encode_and_decode() {
        let catalog = CandidateCatalog::new(&candidates()).unwrap();

        let codes = catalog.encode([("SVC", "{'kernel': 'linear', 'C': 10.0}")]).unwrap();
        let idx = catalog.encoded().iter().position(|row| *row == codes[0]).unwrap();

        let decoded = catalog.decode(&[idx]).unwrap();
        assert_eq!(decoded[0].algorithm, "SVC");
        assert_eq!(decoded[0].parameters.to_string(), "{'C': 10, 'kernel': 'linear'}");

        assert!(matches!(
            catalog.encode([("SVC", "{'kernel': 'poly'}")]),
            Err(RecommenderError::UnseenCategory { .. })
        ));
        assert!(catalog.decode(&[99]).is_err());
    }
}
