//! Error types for the recommendation core

use metarec_gbdt::{ModelError, TrainerError};
use thiserror::Error;

/// Errors surfaced by featurization, encoding, training and recommendation
#[derive(Error, Debug)]
pub enum RecommenderError {
    /// Invalid construction-time settings (unknown ml_type, empty catalog, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialized parameters outside the accepted grammar
    #[error("Parse error at byte {position} in {input:?}: {reason}")]
    Parse {
        input: String,
        position: usize,
        reason: String,
    },

    /// Category not present in the vocabulary fitted on the catalog
    #[error("Unseen category {value:?} in column {column:?}")]
    UnseenCategory { column: String, value: String },

    /// Parameter name that no catalog candidate uses
    #[error("Column {column:?} is not part of the catalog schema")]
    UnknownColumn { column: String },

    /// Integer code never assigned by the encoder
    #[error("Code {code} out of range for column {column:?}")]
    CodeOutOfRange { column: String, code: u32 },

    /// Feature width differs from what the model or descriptor table expects
    #[error("Schema mismatch in {context}: expected width {expected}, found {found}")]
    SchemaMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Recommendation requested before any successful update
    #[error("No score model has been trained yet")]
    EmptyModel,

    #[error("Outcome record for dataset {dataset:?} has no metric {metric:?}")]
    MissingMetric { metric: String, dataset: String },

    #[error("Non-finite value in {0}")]
    NonFinite(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Trainer error: {0}")]
    Trainer(#[from] TrainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for recommender operations
pub type Result<T> = std::result::Result<T, RecommenderError>;
