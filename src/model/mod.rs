//! Random forest regression

pub mod forest;
pub mod metrics;
pub mod tree;

use thiserror::Error;

pub use forest::{ForestConfig, RandomForestRegressor};
pub use metrics::{calculate_metrics, r2_score, RegressionMetrics};
pub use tree::{RegressionTree, SplitRule, TreeConfig, TreeNode};

/// Model fitting and prediction errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot fit on an empty dataset")]
    EmptyDataset,

    #[error("Expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Got {rows} rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("Model is not fitted")]
    NotFitted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
