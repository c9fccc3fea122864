//! Error types for model handling and training

use thiserror::Error;

/// Canonical serialization failures
#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while validating, scoring, or persisting a model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("Feature width mismatch: model expects {expected}, got {found}")]
    FeatureWidth { expected: usize, found: usize },
}

/// Errors returned by the boosting trainer
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("invalid training configuration: {0}")]
    Config(String),

    #[error("warm start rejected: prior model has {prior} features, dataset has {dataset}")]
    IncompatibleWarmStart { prior: usize, dataset: usize },
}
