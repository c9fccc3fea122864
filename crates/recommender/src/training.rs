//! Training set construction
//!
//! Outcome records are inner-joined to dataset descriptors, their
//! algorithm/parameter part is encoded through the catalog, and each row
//! becomes `encoded columns ++ descriptor` with the chosen metric as label.

use crate::catalog::CandidateCatalog;
use crate::errors::{RecommenderError, Result};
use crate::params::ParamSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One historical evaluation of a candidate on a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub dataset: String,
    pub algorithm: String,
    pub parameters: String,
    /// Every other column of the row. Only the configured metric is read,
    /// so ids, timestamps and other metrics may ride along.
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl OutcomeRecord {
    pub fn new(
        dataset: impl Into<String>,
        algorithm: impl Into<String>,
        parameters: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            algorithm: algorithm.into(),
            parameters: parameters.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), Value::from(value));
        self
    }

    /// Numeric value of column `name`; `None` when absent, `Some(None)`
    /// when present but not a finite number
    pub fn metric(&self, name: &str) -> Option<Option<f64>> {
        self.metrics
            .get(name)
            .map(|v| v.as_f64().filter(|x| x.is_finite()))
    }
}

/// A descriptor row as it arrives from the meta-feature source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRow {
    pub dataset: String,
    #[serde(flatten)]
    pub features: BTreeMap<String, f64>,
}

/// Meta-feature vectors keyed by dataset id, all of one width
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorTable {
    feature_names: Option<Vec<String>>,
    width: Option<usize>,
    rows: BTreeMap<String, Vec<f64>>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from named rows; every row must carry the same feature names,
    /// which are ordered by name
    pub fn from_rows(rows: Vec<DescriptorRow>) -> Result<Self> {
        let mut table = Self::new();
        for row in rows {
            let names: Vec<String> = row.features.keys().cloned().collect();
            match &table.feature_names {
                Some(expected) if *expected != names => {
                    return Err(RecommenderError::SchemaMismatch {
                        context: format!("descriptor names for dataset {:?}", row.dataset),
                        expected: expected.len(),
                        found: names.len(),
                    });
                }
                Some(_) => {}
                None => table.feature_names = Some(names),
            }
            table.insert(row.dataset, row.features.into_values().collect())?;
        }
        Ok(table)
    }

    /// Add or replace the descriptor of `dataset`
    pub fn insert(&mut self, dataset: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let dataset = dataset.into();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RecommenderError::NonFinite(format!(
                "descriptor of dataset {dataset:?}"
            )));
        }
        match self.width {
            Some(width) if width != values.len() => {
                return Err(RecommenderError::SchemaMismatch {
                    context: format!("descriptor of dataset {dataset:?}"),
                    expected: width,
                    found: values.len(),
                });
            }
            Some(_) => {}
            None => self.width = Some(values.len()),
        }
        self.rows.insert(dataset, values);
        Ok(())
    }

    pub fn get(&self, dataset: &str) -> Option<&[f64]> {
        self.rows.get(dataset).map(Vec::as_slice)
    }

    pub fn width(&self) -> Option<usize> {
        self.width
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Key of an incorporated evaluation; parameters are in canonical form
pub type SeenKey = (String, String, String);

/// Evaluations already incorporated into training
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet(BTreeSet<SeenKey>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for `(dataset, algorithm, parameters)`; `3.0` and `3` collapse
    pub fn key(dataset: &str, algorithm: &str, parameters: &ParamSet) -> SeenKey {
        (
            dataset.to_string(),
            algorithm.to_string(),
            parameters.canonical().to_string(),
        )
    }

    /// Record every key of a batch whose training succeeded
    pub fn record(&mut self, keys: Vec<SeenKey>) {
        self.0.extend(keys);
    }

    pub fn contains(&self, dataset: &str, algorithm: &str, parameters: &ParamSet) -> bool {
        self.0.contains(&Self::key(dataset, algorithm, parameters))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Joint feature rows with aligned labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn width(&self) -> Option<usize> {
        self.features.first().map(Vec::len)
    }

    /// Append `other`, which must have the same row width
    pub fn extend(&mut self, other: TrainingSet) -> Result<()> {
        if let (Some(expected), Some(found)) = (self.width(), other.width()) {
            if expected != found {
                return Err(RecommenderError::SchemaMismatch {
                    context: "accumulated training features".into(),
                    expected,
                    found,
                });
            }
        }
        self.features.extend(other.features);
        self.labels.extend(other.labels);
        Ok(())
    }
}

/// A built training set plus the seen keys of every record in its batch,
/// orphans included
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingBatch {
    pub set: TrainingSet,
    pub seen_keys: Vec<SeenKey>,
}

/// Turns outcome records into a [`TrainingSet`] for one catalog and metric
pub struct TrainingSetBuilder<'a> {
    catalog: &'a CandidateCatalog,
    metric: &'a str,
}

impl<'a> TrainingSetBuilder<'a> {
    pub fn new(catalog: &'a CandidateCatalog, metric: &'a str) -> Self {
        Self { catalog, metric }
    }

    /// Join, encode and label `records`
    ///
    /// Records whose dataset has no descriptor are dropped from the set but
    /// still contribute a seen key. Nothing is recorded here; the caller
    /// adds the keys to its [`SeenSet`] once the model has been refitted.
    pub fn build(
        &self,
        records: &[OutcomeRecord],
        descriptors: &DescriptorTable,
    ) -> Result<TrainingBatch> {
        let seen_keys = records
            .iter()
            .map(|r| {
                let params = ParamSet::parse(&r.parameters)?;
                Ok(SeenSet::key(&r.dataset, &r.algorithm, &params))
            })
            .collect::<Result<Vec<_>>>()?;

        let joined: Vec<(&OutcomeRecord, &[f64])> = records
            .iter()
            .filter_map(|r| descriptors.get(&r.dataset).map(|d| (r, d)))
            .collect();
        let dropped = records.len() - joined.len();
        if dropped > 0 {
            warn!(
                dropped,
                "Outcome records without a dataset descriptor were dropped"
            );
        }

        let labels = joined
            .iter()
            .map(|(r, _)| {
                let value = r.metric(self.metric).ok_or_else(|| {
                    RecommenderError::MissingMetric {
                        metric: self.metric.to_string(),
                        dataset: r.dataset.clone(),
                    }
                })?;
                value.ok_or_else(|| {
                    RecommenderError::NonFinite(format!(
                        "metric {:?} of dataset {:?}",
                        self.metric, r.dataset
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let codes = self.catalog.encode(
            joined
                .iter()
                .map(|(r, _)| (r.algorithm.as_str(), r.parameters.as_str())),
        )?;

        let features: Vec<Vec<f64>> = codes
            .iter()
            .zip(&joined)
            .map(|(row, (_, descriptor))| joint_features(row, descriptor))
            .collect();

        assert_eq!(
            features.len(),
            labels.len(),
            "training features and labels must stay row aligned"
        );
        debug!(rows = features.len(), "Training set built");

        Ok(TrainingBatch {
            set: TrainingSet { features, labels },
            seen_keys,
        })
    }
}

/// `codes ++ descriptor` as one real-valued row
pub fn joint_features(codes: &[u32], descriptor: &[f64]) -> Vec<f64> {
    codes
        .iter()
        .map(|&c| c as f64)
        .chain(descriptor.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Candidate;

    fn catalog() -> CandidateCatalog {
        CandidateCatalog::new(&[
            Candidate::new("SVC", "{'C': 1}"),
            Candidate::new("SVC", "{'C': 10}"),
            Candidate::new("GaussianNB", "{}"),
        ])
        .unwrap()
    }

    fn descriptors() -> DescriptorTable {
        let mut table = DescriptorTable::new();
        table.insert("iris", vec![150.0, 4.0]).unwrap();
        table.insert("wine", vec![178.0, 13.0]).unwrap();
        table
    }

    #[test]
    fn test_build_joins_in_record_order() {
        let records = vec![
            OutcomeRecord::new("wine", "SVC", "{'C': 10}").with_metric("bal_accuracy", 0.9),
            OutcomeRecord::new("orphan", "SVC", "{'C': 1}").with_metric("bal_accuracy", 0.1),
            OutcomeRecord::new("iris", "GaussianNB", "{}").with_metric("bal_accuracy", 0.7),
        ];
        let catalog = catalog();

        let batch = TrainingSetBuilder::new(&catalog, "bal_accuracy")
            .build(&records, &descriptors())
            .unwrap();
        let set = &batch.set;

        // columns: C, algorithm
        assert_eq!(set.labels, vec![0.9, 0.7]);
        assert_eq!(set.features[0], vec![1.0, 1.0, 178.0, 13.0]);
        assert_eq!(set.features[1], vec![2.0, 0.0, 150.0, 4.0]);
        assert_eq!(batch.seen_keys.len(), 3);

        let mut seen = SeenSet::new();
        seen.record(batch.seen_keys);
        assert!(seen.contains("orphan", "SVC", &ParamSet::parse("{'C': 1.0}").unwrap()));
    }

    #[test]
    fn test_missing_metric_is_reported() {
        let records = vec![OutcomeRecord::new("iris", "SVC", "{'C': 1}").with_metric("mse", 1.0)];
        let catalog = catalog();

        let err = TrainingSetBuilder::new(&catalog, "bal_accuracy")
            .build(&records, &descriptors())
            .unwrap_err();
        assert!(matches!(err, RecommenderError::MissingMetric { .. }));
    }

    #[test]
    fn test_unseen_category_propagates() {
        let records =
            vec![OutcomeRecord::new("iris", "SVC", "{'C': 100}").with_metric("bal_accuracy", 0.5)];
        let catalog = catalog();

        let err = TrainingSetBuilder::new(&catalog, "bal_accuracy")
            .build(&records, &descriptors())
            .unwrap_err();
        assert!(matches!(err, RecommenderError::UnseenCategory { .. }));
    }

    #[test]
    fn test_descriptor_table_validation() {
        let mut table = descriptors();
        assert!(matches!(
            table.insert("digits", vec![1.0]),
            Err(RecommenderError::SchemaMismatch { expected: 2, found: 1, .. })
        ));
        assert!(matches!(
            table.insert("digits", vec![1.0, f64::NAN]),
            Err(RecommenderError::NonFinite(_))
        ));

        let rows = vec![
            DescriptorRow {
                dataset: "a".into(),
                features: [("n_rows".to_string(), 10.0), ("n_cols".to_string(), 2.0)].into(),
            },
            DescriptorRow {
                dataset: "b".into(),
                features: [("n_rows".to_string(), 5.0)].into(),
            },
        ];
        assert!(DescriptorTable::from_rows(rows[..1].to_vec()).is_ok());
        assert!(DescriptorTable::from_rows(rows).is_err());
    }

    #[test]
    fn test_descriptor_rows_ordered_by_name() {
        let table = DescriptorTable::from_rows(vec![DescriptorRow {
            dataset: "a".into(),
            features: [("n_rows".to_string(), 10.0), ("n_cols".to_string(), 2.0)].into(),
        }])
        .unwrap();
        assert_eq!(table.feature_names().unwrap(), ["n_cols", "n_rows"]);
        assert_eq!(table.get("a").unwrap(), [2.0, 10.0]);
    }

    #[test]
    fn test_training_set_extend_checks_width() {
        let mut set = TrainingSet {
            features: vec![vec![1.0, 2.0]],
            labels: vec![0.5],
        };
        set.extend(TrainingSet {
            features: vec![vec![3.0, 4.0]],
            labels: vec![0.6],
        })
        .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set
            .extend(TrainingSet {
                features: vec![vec![1.0]],
                labels: vec![0.1],
            })
            .is_err());
    }

    #[test]
    fn test_outcome_record_json_shape() {
        let record: OutcomeRecord = serde_json::from_str(
            r#"{"dataset":"iris","algorithm":"SVC","parameters":"{'C': 1}","bal_accuracy":0.8}"#,
        )
        .unwrap();
        assert_eq!(record.metric("bal_accuracy"), Some(Some(0.8)));
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let records: Vec<OutcomeRecord> = serde_json::from_str(
            r#"[{"dataset":"iris","algorithm":"SVC","parameters":"{'C': 1}",
                 "run_id":"a1f3","finished":"2024-05-01T10:00:00Z","bal_accuracy":0.8}]"#,
        )
        .unwrap();
        let catalog = catalog();

        let batch = TrainingSetBuilder::new(&catalog, "bal_accuracy")
            .build(&records, &descriptors())
            .unwrap();
        assert_eq!(batch.set.labels, vec![0.8]);

        let err = TrainingSetBuilder::new(&catalog, "run_id")
            .build(&records, &descriptors())
            .unwrap_err();
        assert!(matches!(err, RecommenderError::NonFinite(_)));
    }
}
