//! Data loading, categorical encoding and train/test splitting

pub mod dataset;
pub mod encoder;
pub mod loader;

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

// Re-export commonly used types
pub use dataset::{Dataset, Split};
pub use encoder::{ColumnMapping, FeatureValue, OrdinalEncoder, MISSING_CODE, UNKNOWN_CODE};
pub use loader::{
    categorical_features, feature_columns, load_house_prices, FeatureDict, HousePrices,
    DEFAULT_DATA_DIR, INDEX_COLUMN, TARGET_COLUMN,
};

/// Data loading and preparation errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Dataset not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse feature dictionary: {0}")]
    Labels(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Column {0} is not numeric after encoding")]
    NonNumeric(String),

    #[error("Column {0} contains missing values")]
    MissingValue(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Invalid split: {0}")]
    InvalidSplit(String),
}
