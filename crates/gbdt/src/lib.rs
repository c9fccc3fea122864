//! Fixed-point Gradient Boosted Decision Trees
//!
//! Regression ensembles used as the score model of the metarec
//! recommender. Every value inside a tree is an integer at [`SCALE`]
//! precision, so training and scoring are reproducible bit for bit.
//!
//! Modules:
//! - `tree`: nodes and single-tree traversal
//! - `model`: the ensemble, canonical JSON and BLAKE3 hashing
//! - `dataset`: fixed-point training matrices and real/fixed conversion
//! - `cart`: exact-greedy regression tree builder
//! - `trainer`: boosting loop with warm start
//! - `serde_canon`: canonical JSON helpers
//! - `errors`: error types

pub mod cart;
pub mod dataset;
pub mod errors;
pub mod model;
pub mod serde_canon;
pub mod trainer;
pub mod tree;

pub use dataset::{from_fixed, to_fixed, Dataset};
pub use errors::{CanonicalError, ModelError, TrainerError};
pub use model::{Model, SCALE};
pub use trainer::{GbdtConfig, GbdtTrainer};
pub use tree::{Node, Tree};
