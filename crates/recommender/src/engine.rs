//! Recommendation engine
//!
//! [`MetaRecommender`] ties the catalog, the training set builder and the
//! score model together behind the two boundary operations, `update` and
//! `recommend`. Calls take `&mut self`, so an instance is single-writer by
//! construction; share it behind a lock if several callers need it.

use crate::catalog::{Candidate, CandidateCatalog};
use crate::config::{RecommenderConfig, TrainingWindow};
use crate::errors::{RecommenderError, Result};
use crate::score_model::{GbdtScoreModel, ModelState, ScoreModel, VersionedModel};
use crate::training::{
    joint_features, DescriptorTable, OutcomeRecord, SeenSet, TrainingSet, TrainingSetBuilder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Ranked recommendations; the three sequences are index aligned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub algorithms: Vec<String>,
    /// Canonical serialized parameter sets
    pub parameters: Vec<String>,
    pub scores: Vec<f64>,
}

impl Recommendations {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

pub struct MetaRecommender<M: ScoreModel = GbdtScoreModel> {
    catalog: CandidateCatalog,
    metric: String,
    sample_size: usize,
    exclude_seen: bool,
    training_window: TrainingWindow,
    rng: StdRng,
    seen: SeenSet,
    training: TrainingSet,
    model: VersionedModel<M>,
}

impl MetaRecommender<GbdtScoreModel> {
    /// Build a recommender backed by gradient boosted trees
    pub fn new(config: &RecommenderConfig, candidates: &[Candidate]) -> Result<Self> {
        Self::with_model(config, candidates, GbdtScoreModel::new(config.gbdt.clone()))
    }

    /// Canonical JSON of the current score model
    pub fn model_json(&self) -> Result<String> {
        let state = self.model.state().ok_or(RecommenderError::EmptyModel)?;
        Ok(state.inner.to_canonical_json()?)
    }

    /// BLAKE3 hex digest of [`MetaRecommender::model_json`]
    pub fn model_hash(&self) -> Result<String> {
        let state = self.model.state().ok_or(RecommenderError::EmptyModel)?;
        Ok(state.inner.hash_hex()?)
    }
}

impl<M: ScoreModel> MetaRecommender<M> {
    pub fn with_model(
        config: &RecommenderConfig,
        candidates: &[Candidate],
        model: M,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = CandidateCatalog::new(candidates)?;
        let sample_size = config.sample_size.min(catalog.len());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            ml_type = %config.ml_type,
            metric = config.metric(),
            sample_size,
            "Recommender initialized"
        );

        Ok(Self {
            catalog,
            metric: config.metric().to_string(),
            sample_size,
            exclude_seen: config.exclude_seen,
            training_window: config.training_window,
            rng,
            seen: SeenSet::new(),
            training: TrainingSet::default(),
            model: VersionedModel::new(model),
        })
    }

    pub fn catalog(&self) -> &CandidateCatalog {
        &self.catalog
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Candidates scored per call, already clamped to the catalog size
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Rows the current score model was last fitted on
    pub fn training_set(&self) -> &TrainingSet {
        &self.training
    }

    pub fn model_state(&self) -> Option<&ModelState<M::State>> {
        self.model.state()
    }

    /// Incorporate new outcome records and refit the score model
    pub fn update(
        &mut self,
        records: &[OutcomeRecord],
        descriptors: &DescriptorTable,
    ) -> Result<()> {
        info!(records = records.len(), "Updating recommender");
        let batch =
            TrainingSetBuilder::new(&self.catalog, &self.metric).build(records, descriptors)?;

        let state = match self.training_window {
            TrainingWindow::Latest => {
                let state = self.model.fit(&batch.set)?;
                self.training = batch.set;
                state
            }
            TrainingWindow::Accumulate => {
                let kept = self.training.len();
                self.training.extend(batch.set)?;
                match self.model.fit(&self.training) {
                    Ok(state) => state,
                    Err(e) => {
                        self.training.features.truncate(kept);
                        self.training.labels.truncate(kept);
                        return Err(e);
                    }
                }
            }
        };
        info!(
            generation = state.generation,
            trained_rows = state.trained_rows,
            "Recommender updated"
        );

        self.seen.record(batch.seen_keys);
        Ok(())
    }

    /// Top `n_recs` candidates for the dataset described by `descriptor`
    ///
    /// `dataset_id` only matters for logging and, with `exclude_seen`, for
    /// skipping candidates already evaluated on that dataset.
    pub fn recommend(
        &mut self,
        dataset_id: &str,
        n_recs: usize,
        descriptor: &[f64],
    ) -> Result<Recommendations> {
        self.try_recommend(dataset_id, n_recs, descriptor)
            .map_err(|e| {
                error!(dataset_id, error = %e, "Recommendation failed");
                e
            })
    }

    fn try_recommend(
        &mut self,
        dataset_id: &str,
        n_recs: usize,
        descriptor: &[f64],
    ) -> Result<Recommendations> {
        if n_recs == 0 {
            return Err(RecommenderError::InvalidArgument(
                "n_recs must be at least 1".into(),
            ));
        }
        let state = self.model.state().ok_or(RecommenderError::EmptyModel)?;
        let width = self.catalog.schema().len() + descriptor.len();
        if width != state.feature_count {
            return Err(RecommenderError::SchemaMismatch {
                context: format!("descriptor of dataset {dataset_id:?}"),
                expected: state.feature_count,
                found: width,
            });
        }
        if descriptor.iter().any(|v| !v.is_finite()) {
            return Err(RecommenderError::NonFinite(format!(
                "descriptor of dataset {dataset_id:?}"
            )));
        }

        let mut sample = self.catalog.sample(self.sample_size, &mut self.rng);
        if self.exclude_seen {
            let decoded = self.catalog.decode(&sample)?;
            let drawn = sample.len();
            sample = sample
                .into_iter()
                .zip(decoded)
                .filter(|(_, row)| !self.seen.contains(dataset_id, &row.algorithm, &row.parameters))
                .map(|(idx, _)| idx)
                .collect();
            debug!(excluded = drawn - sample.len(), "Dropped already evaluated candidates");
            if sample.is_empty() {
                warn!(dataset_id, "Every sampled candidate was already evaluated");
                return Ok(Recommendations::default());
            }
        }
        debug!(dataset_id, sampled = ?sample, "Scoring candidates");

        let encoded = self.catalog.encoded();
        let features: Vec<Vec<f64>> = sample
            .iter()
            .map(|&idx| joint_features(&encoded[idx], descriptor))
            .collect();
        let scores = self.model.predict(&features)?;

        let mut order: Vec<usize> = (0..sample.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order.truncate(n_recs);

        let winners: Vec<usize> = order.iter().map(|&pos| sample[pos]).collect();
        let decoded = self.catalog.decode(&winners)?;

        let mut recs = Recommendations::default();
        for (row, &pos) in decoded.into_iter().zip(&order) {
            recs.algorithms.push(row.algorithm);
            recs.parameters.push(row.parameters.to_string());
            recs.scores.push(scores[pos]);
        }
        debug!(dataset_id, returned = recs.len(), "Recommendations ranked");
        Ok(recs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MlType;
    use crate::params::ParamSet;

    /// Scores a row by the code of its `k` column through a fixed table
    struct TableModel {
        column: usize,
        scores: Vec<f64>,
    }

    impl ScoreModel for TableModel {
        type State = ();

        fn fit(&self, _: &[Vec<f64>], _: &[f64], _: Option<&()>) -> Result<()> {
            Ok(())
        }

        fn predict(&self, _: &(), features: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(features
                .iter()
                .map(|row| self.scores[row[self.column] as usize])
                .collect())
        }
    }

    fn candidates() -> Vec<Candidate> {
        (0..4)
            .map(|k| Candidate::new("KNN", format!("{{'k': {k}}}")))
            .collect()
    }

    fn config(seed: u64) -> RecommenderConfig {
        RecommenderConfig {
            seed: Some(seed),
            sample_size: 4,
            ..RecommenderConfig::new(MlType::Classifier)
        }
    }

    fn descriptors() -> DescriptorTable {
        let mut table = DescriptorTable::new();
        table.insert("iris", vec![150.0]).unwrap();
        table
    }

    fn trained(config: &RecommenderConfig, scores: Vec<f64>) -> MetaRecommender<TableModel> {
        // columns: algorithm, k
        let model = TableModel { column: 1, scores };
        let mut rec = MetaRecommender::with_model(config, &candidates(), model).unwrap();
        let records = vec![
            OutcomeRecord::new("iris", "KNN", "{'k': 1}").with_metric("bal_accuracy", 0.9),
        ];
        rec.update(&records, &descriptors()).unwrap();
        rec
    }

    #[test]
    fn test_ranking_is_descending_with_stable_ties() {
        let seed = 11;
        let mut rec = trained(&config(seed), vec![0.5, 0.9, 0.5, 0.1]);

        // the first draw of a fresh generator with the same seed is the sample
        let sample = rec
            .catalog()
            .sample(4, &mut StdRng::seed_from_u64(seed));
        let k_of = |idx: usize| rec.catalog().encoded()[idx][1];
        let tied: Vec<u32> = sample
            .iter()
            .map(|&i| k_of(i))
            .filter(|&k| k == 0 || k == 2)
            .collect();

        let recs = rec.recommend("wine", 4, &[178.0]).unwrap();
        let expected: Vec<String> = [1, tied[0], tied[1], 3]
            .iter()
            .map(|k| format!("{{'k': {k}}}"))
            .collect();
        assert_eq!(recs.parameters, expected);
        assert_eq!(recs.scores, vec![0.9, 0.5, 0.5, 0.1]);
        assert!(recs.algorithms.iter().all(|a| a == "KNN"));
    }

    #[test]
    fn test_n_recs_bounds() {
        let mut rec = trained(&config(1), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(rec.recommend("wine", 2, &[1.0]).unwrap().len(), 2);
        assert_eq!(rec.recommend("wine", 10, &[1.0]).unwrap().len(), 4);
        assert!(matches!(
            rec.recommend("wine", 0, &[1.0]),
            Err(RecommenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_recommend_before_update() {
        let model = TableModel { column: 1, scores: vec![0.0; 4] };
        let mut rec = MetaRecommender::with_model(&config(1), &candidates(), model).unwrap();
        assert!(matches!(
            rec.recommend("iris", 1, &[150.0]),
            Err(RecommenderError::EmptyModel)
        ));
    }

    #[test]
    fn test_descriptor_width_checked() {
        let mut rec = trained(&config(1), vec![0.0; 4]);
        assert!(matches!(
            rec.recommend("wine", 1, &[1.0, 2.0]),
            Err(RecommenderError::SchemaMismatch { expected: 3, found: 4, .. })
        ));
        assert!(matches!(
            rec.recommend("wine", 1, &[f64::NAN]),
            Err(RecommenderError::NonFinite(_))
        ));
    }

    #[test]
    fn test_exclude_seen() {
        let mut config = config(5);
        config.exclude_seen = true;
        let mut rec = trained(&config, vec![0.1, 0.9, 0.2, 0.3]);

        let recs = rec.recommend("iris", 4, &[150.0]).unwrap();
        assert_eq!(recs.len(), 3);
        assert!(!recs.parameters.contains(&"{'k': 1}".to_string()));

        // other datasets are unaffected
        let recs = rec.recommend("wine", 1, &[150.0]).unwrap();
        assert_eq!(recs.parameters, vec!["{'k': 1}".to_string()]);
    }

    #[test]
    fn test_accumulate_window_keeps_history() {
        let mut config = config(3);
        config.training_window = TrainingWindow::Accumulate;
        let mut rec = trained(&config, vec![0.0; 4]);

        let more =
            vec![OutcomeRecord::new("iris", "KNN", "{'k': 2}").with_metric("bal_accuracy", 0.4)];
        rec.update(&more, &descriptors()).unwrap();
        assert_eq!(rec.training_set().len(), 2);
        assert_eq!(rec.model_state().unwrap().generation, 2);
        assert_eq!(rec.seen().len(), 2);

        let mut latest = trained(&self::config(3), vec![0.0; 4]);
        latest.update(&more, &descriptors()).unwrap();
        assert_eq!(latest.training_set().len(), 1);
    }

    #[test]
    fn test_failed_update_keeps_model() {
        let mut rec = trained(&config(1), vec![0.0; 4]);
        let orphans =
            vec![OutcomeRecord::new("digits", "KNN", "{'k': 3}").with_metric("bal_accuracy", 0.5)];

        assert!(matches!(
            rec.update(&orphans, &descriptors()),
            Err(RecommenderError::InvalidArgument(_))
        ));
        assert_eq!(rec.model_state().unwrap().generation, 1);
        assert_eq!(rec.model_state().unwrap().trained_rows, 1);
        assert_eq!(rec.training_set().len(), 1);
        assert_eq!(rec.seen().len(), 1);
        assert!(!rec.seen().contains("digits", "KNN", &ParamSet::parse("{'k': 3}").unwrap()));
    }

    #[test]
    fn test_failed_first_update_records_nothing() {
        let model = TableModel { column: 1, scores: vec![0.0; 4] };
        let mut config = config(1);
        config.exclude_seen = true;
        let mut rec = MetaRecommender::with_model(&config, &candidates(), model).unwrap();
        let orphans =
            vec![OutcomeRecord::new("digits", "KNN", "{'k': 3}").with_metric("bal_accuracy", 0.5)];

        assert!(rec.update(&orphans, &descriptors()).is_err());
        assert!(rec.model_state().is_none());
        assert!(rec.seen().is_empty());
    }

    #[test]
    fn test_accumulate_rollback_on_width_change() {
        let mut config = config(2);
        config.training_window = TrainingWindow::Accumulate;
        let mut rec = trained(&config, vec![0.0; 4]);

        let mut wide = DescriptorTable::new();
        wide.insert("wine", vec![178.0, 13.0]).unwrap();
        let more =
            vec![OutcomeRecord::new("wine", "KNN", "{'k': 2}").with_metric("bal_accuracy", 0.4)];

        assert!(matches!(
            rec.update(&more, &wide),
            Err(RecommenderError::SchemaMismatch { .. })
        ));
        assert_eq!(rec.training_set().len(), 1);
        assert_eq!(rec.seen().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config(1);
        config.sample_size = 0;
        let model = TableModel { column: 1, scores: vec![] };
        assert!(matches!(
            MetaRecommender::with_model(&config, &candidates(), model),
            Err(RecommenderError::Configuration(_))
        ));
    }
}
