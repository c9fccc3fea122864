//! Score model
//!
//! [`ScoreModel`] is the seam between the recommender and the regression
//! backend. Fitting returns a new state value instead of mutating a shared
//! model; [`VersionedModel`] owns the current state, numbers each refit and
//! enforces the feature width the state was trained on.

use crate::errors::{RecommenderError, Result};
use crate::training::TrainingSet;
use metarec_gbdt::{from_fixed, to_fixed, Dataset, GbdtConfig, GbdtTrainer, Model};
use tracing::{debug, info};

/// Regression backend mapping joint feature rows to expected performance
pub trait ScoreModel {
    /// Learned parameters
    type State: Clone;

    /// Train on `features`/`labels`, continuing from `warm_start` if given
    fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        warm_start: Option<&Self::State>,
    ) -> Result<Self::State>;

    /// One score per row
    fn predict(&self, state: &Self::State, features: &[Vec<f64>]) -> Result<Vec<f64>>;
}

/// Gradient boosted trees from `metarec-gbdt`
pub struct GbdtScoreModel {
    trainer: GbdtTrainer,
}

impl GbdtScoreModel {
    pub fn new(config: GbdtConfig) -> Self {
        Self {
            trainer: GbdtTrainer::new(config),
        }
    }
}

impl ScoreModel for GbdtScoreModel {
    type State = Model;

    fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
        warm_start: Option<&Model>,
    ) -> Result<Model> {
        let dataset = Dataset::from_real(features, labels)?;
        for (i, (min, max)) in dataset.feature_stats().iter().enumerate() {
            debug!(feature = i, min, max, "Feature range (fixed-point)");
        }
        Ok(self.trainer.train_from(&dataset, warm_start)?)
    }

    fn predict(&self, state: &Model, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        features
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let fixed = row
                    .iter()
                    .map(|&v| to_fixed(v))
                    .collect::<Option<Vec<i64>>>()
                    .ok_or_else(|| RecommenderError::NonFinite(format!("prediction row {i}")))?;
                Ok(from_fixed(state.score_checked(&fixed)?))
            })
            .collect()
    }
}

/// A trained state plus its bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState<S> {
    /// Number of successful fits that produced this state, starting at 1
    pub generation: u64,
    pub feature_count: usize,
    /// Rows in the training set of the latest fit
    pub trained_rows: usize,
    pub inner: S,
}

/// Owns the current state of a [`ScoreModel`]
pub struct VersionedModel<M: ScoreModel> {
    model: M,
    state: Option<ModelState<M::State>>,
}

impl<M: ScoreModel> VersionedModel<M> {
    pub fn new(model: M) -> Self {
        Self { model, state: None }
    }

    pub fn state(&self) -> Option<&ModelState<M::State>> {
        self.state.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Refit on `set`, warm-starting from the current state
    ///
    /// The current state is replaced only when the fit succeeds.
    pub fn fit(&mut self, set: &TrainingSet) -> Result<&ModelState<M::State>> {
        let width = set.width().ok_or_else(|| {
            RecommenderError::InvalidArgument("training set has no rows".into())
        })?;

        if let Some(current) = &self.state {
            if current.feature_count != width {
                return Err(RecommenderError::SchemaMismatch {
                    context: "training features vs. trained score model".into(),
                    expected: current.feature_count,
                    found: width,
                });
            }
        }

        info!(rows = set.len(), width, "Updating score model");
        let inner = self.model.fit(
            &set.features,
            &set.labels,
            self.state.as_ref().map(|s| &s.inner),
        )?;
        let generation = self.state.as_ref().map_or(1, |s| s.generation + 1);
        info!(generation, "Score model updated");

        Ok(self.state.insert(ModelState {
            generation,
            feature_count: width,
            trained_rows: set.len(),
            inner,
        }))
    }

    /// Score rows of the trained width
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let state = self.state.as_ref().ok_or(RecommenderError::EmptyModel)?;
        if let Some(row) = features.iter().find(|r| r.len() != state.feature_count) {
            return Err(RecommenderError::SchemaMismatch {
                context: "prediction features vs. trained score model".into(),
                expected: state.feature_count,
                found: row.len(),
            });
        }
        self.model.predict(&state.inner, features)
    }
}
