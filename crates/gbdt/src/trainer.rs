//! Gradient boosting trainer
//!
//! Squared-error boosting over fixed-point data. Training can start from
//! scratch or continue from a prior [`Model`], in which case the prior
//! trees are kept and new ones are appended (warm start).

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::errors::TrainerError;
use crate::model::{Model, SCALE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Boosting configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    /// Trees added per call to [`GbdtTrainer::train_from`]
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Shrinkage, fixed-point (100_000 = 0.1)
    pub learning_rate: i64,
    /// Threshold resolution, fixed-point
    pub quant_step: i64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 500,
            max_depth: 6,
            min_samples_leaf: 1,
            learning_rate: 100_000,
            quant_step: 1000,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.num_trees == 0 {
            return Err(TrainerError::Config("num_trees must be at least 1".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainerError::Config("min_samples_leaf must be at least 1".into()));
        }
        if self.learning_rate <= 0 || self.learning_rate > SCALE {
            return Err(TrainerError::Config(format!(
                "learning_rate must be in (0, {SCALE}], got {}",
                self.learning_rate
            )));
        }
        if self.quant_step < 1 {
            return Err(TrainerError::Config("quant_step must be at least 1".into()));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            quant_step: self.quant_step,
        }
    }
}

pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train a fresh model
    pub fn train(&self, dataset: &Dataset) -> Result<Model, TrainerError> {
        self.train_from(dataset, None)
    }

    /// Train, continuing from `prior` when given
    ///
    /// With a prior model the starting predictions are its scores and its
    /// bias is kept; only the residual left by the prior is fitted.
    pub fn train_from(
        &self,
        dataset: &Dataset,
        prior: Option<&Model>,
    ) -> Result<Model, TrainerError> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(TrainerError::Dataset("Dataset is empty".into()));
        }

        let (bias, mut trees, mut predictions) = match prior {
            Some(model) => {
                if model.feature_count != dataset.feature_count {
                    return Err(TrainerError::IncompatibleWarmStart {
                        prior: model.feature_count,
                        dataset: dataset.feature_count,
                    });
                }
                let predictions: Vec<i64> =
                    dataset.features.iter().map(|row| model.score(row)).collect();
                (model.bias, model.trees.clone(), predictions)
            }
            None => {
                let bias = mean(&dataset.targets);
                (bias, Vec::new(), vec![bias; dataset.len()])
            }
        };

        info!(
            samples = dataset.len(),
            features = dataset.feature_count,
            prior_trees = trees.len(),
            new_trees = self.config.num_trees,
            "Boosting"
        );

        let tree_config = self.config.tree_config();
        trees.reserve(self.config.num_trees);

        for round in 0..self.config.num_trees {
            let gradients: Vec<i64> = predictions
                .iter()
                .zip(&dataset.targets)
                .map(|(&p, &t)| p.saturating_sub(t))
                .collect();

            let tree = CartBuilder::new(&dataset.features, &gradients, tree_config.clone())
                .build(self.config.learning_rate);

            for (pred, row) in predictions.iter_mut().zip(&dataset.features) {
                let step = (tree.evaluate(row) as i128 * self.config.learning_rate as i128)
                    / SCALE as i128;
                *pred = pred.saturating_add(step as i64);
            }

            debug!(round, leaves = tree.leaf_count(), "Tree added");
            trees.push(tree);
        }

        Ok(Model::new(trees, bias, dataset.feature_count))
    }
}

fn mean(targets: &[i64]) -> i64 {
    if targets.is_empty() {
        return 0;
    }
    let sum: i128 = targets.iter().map(|&t| t as i128).sum();
    (sum / targets.len() as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_dataset() -> Dataset {
        Dataset::new(
            vec![vec![0], vec![SCALE], vec![2 * SCALE], vec![3 * SCALE]],
            vec![0, 0, 1_000_000, 1_000_000],
        )
        .unwrap()
    }

    fn small_config(num_trees: usize) -> GbdtConfig {
        GbdtConfig {
            num_trees,
            max_depth: 2,
            min_samples_leaf: 1,
            learning_rate: 500_000,
            quant_step: 1000,
        }
    }

    #[test]
    fn test_fresh_training_fits_step() {
        let model = GbdtTrainer::new(small_config(10)).train(&step_dataset()).unwrap();

        assert_eq!(model.num_trees(), 10);
        assert_eq!(model.bias, 500_000);
        assert!(model.validate().is_ok());
        assert!(model.score(&[0]) < 10_000);
        assert!(model.score(&[3 * SCALE]) > 990_000);
    }

    #[test]
    fn test_warm_start_appends_trees() {
        let trainer = GbdtTrainer::new(small_config(3));
        let first = trainer.train(&step_dataset()).unwrap();
        let second = trainer.train_from(&step_dataset(), Some(&first)).unwrap();

        assert_eq!(second.num_trees(), 6);
        assert_eq!(second.bias, first.bias);
        assert_eq!(&second.trees[..3], &first.trees[..]);

        let err_first = (first.score(&[0]) - 0).abs();
        let err_second = (second.score(&[0]) - 0).abs();
        assert!(err_second < err_first);
    }

    #[test]
    fn test_warm_start_rejects_width_change() {
        let trainer = GbdtTrainer::new(small_config(1));
        let prior = trainer.train(&step_dataset()).unwrap();
        let wider = Dataset::new(vec![vec![0, 0]], vec![0]).unwrap();

        assert!(matches!(
            trainer.train_from(&wider, Some(&prior)),
            Err(TrainerError::IncompatibleWarmStart { prior: 1, dataset: 2 })
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(GbdtConfig::default().validate().is_ok());
        for bad in [
            GbdtConfig { num_trees: 0, ..GbdtConfig::default() },
            GbdtConfig { min_samples_leaf: 0, ..GbdtConfig::default() },
            GbdtConfig { learning_rate: 0, ..GbdtConfig::default() },
            GbdtConfig { learning_rate: 2 * SCALE, ..GbdtConfig::default() },
            GbdtConfig { quant_step: 0, ..GbdtConfig::default() },
        ] {
            assert!(bad.validate().is_err());
        }
    }

    #[test]
    fn test_large_magnitude_labels_train() {
        // squared-error metrics in the 1e9..1e10 range over many rows
        let features: Vec<Vec<f64>> = (0..20_000).map(|i| vec![(i % 2) as f64]).collect();
        let targets: Vec<f64> = (0..20_000)
            .map(|i| if i % 2 == 0 { 1e9 } else { 1e10 })
            .collect();
        let dataset = Dataset::from_real(&features, &targets).unwrap();
        let config = GbdtConfig {
            num_trees: 1,
            max_depth: 1,
            min_samples_leaf: 1,
            learning_rate: SCALE,
            quant_step: 1000,
        };

        let model = GbdtTrainer::new(config).train(&dataset).unwrap();

        assert_eq!(model.trees[0].leaf_count(), 2);
        assert!(model.score(&[0]) < model.bias);
        assert!(model.score(&[SCALE]) > model.bias);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let empty = Dataset::new(vec![], vec![]).unwrap();
        assert!(GbdtTrainer::new(small_config(1)).train(&empty).is_err());
    }
}
