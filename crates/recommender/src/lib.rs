//! Meta-learning recommender for ML algorithm and hyperparameter choices
//!
//! Learns a score model over `(algorithm, parameters, dataset descriptor)`
//! from historical evaluations and ranks a fixed candidate catalog for new
//! datasets.
//!
//! Modules:
//! - `params`: literal parameter-set grammar and typed values
//! - `featurizer`: parameter sets to sentinel-filled string columns and back
//! - `encoder`: per-column categorical encoding fitted on the catalog
//! - `catalog`: deduplicated, encoded candidate universe with sampling
//! - `training`: outcome records, descriptors, seen set, training set builder
//! - `score_model`: score model seam, GBDT backend, versioned state
//! - `engine`: `update` and `recommend`
//! - `config`: TOML and environment configuration
//! - `errors`: error types

pub mod catalog;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod featurizer;
pub mod params;
pub mod score_model;
pub mod training;

pub use catalog::{Candidate, CandidateCatalog};
pub use config::{MlType, RecommenderConfig, TrainingWindow};
pub use encoder::CategoricalEncoder;
pub use engine::{MetaRecommender, Recommendations};
pub use errors::{RecommenderError, Result};
pub use featurizer::{from_columns, to_columns, DecodedRow, ParamTable, SchemaMode, MISSING};
pub use params::{ParamSet, ParamValue};
pub use score_model::{GbdtScoreModel, ModelState, ScoreModel, VersionedModel};
pub use training::{
    DescriptorRow, DescriptorTable, OutcomeRecord, SeenKey, SeenSet, TrainingBatch, TrainingSet,
    TrainingSetBuilder,
};

/// Crate version, reported by the `metarec` binary
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
