//! Per-prediction feature contributions and the explainer built on them

pub mod shap;
pub mod smart;

use std::path::PathBuf;
use thiserror::Error;

use crate::model::ModelError;

pub use shap::{expected_value, forest_expected_value, forest_shap, tree_shap};
pub use smart::{Predictions, SmartExplainer};

/// Explainer errors
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("Explainer is not compiled")]
    NotCompiled,

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown row id: {0}")]
    UnknownId(i64),

    #[error("Expected {expected} predictions, got {actual}")]
    PredictionMismatch { expected: usize, actual: usize },

    #[error("Prediction ids do not match row ids (first difference at position {position})")]
    IndexMismatch { position: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize explainer: {0}")]
    Serialization(#[from] serde_json::Error),
}
