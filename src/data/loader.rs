//! Bundled house price dataset loading

use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::DataError;

/// Default data directory (relative to project root)
pub const DEFAULT_DATA_DIR: &str = "data";
/// Dataset file name inside the data directory
pub const DATASET_FILE: &str = "house_prices_dataset.csv";
/// Feature dictionary file name inside the data directory
pub const LABELS_FILE: &str = "house_prices_labels.json";

/// Row index column
pub const INDEX_COLUMN: &str = "Id";
/// Regression target column
pub const TARGET_COLUMN: &str = "SalePrice";

/// Column name -> human readable description
pub type FeatureDict = BTreeMap<String, String>;

/// House price table plus its feature dictionary
#[derive(Debug, Clone)]
pub struct HousePrices {
    pub frame: DataFrame,
    pub labels: FeatureDict,
}

impl HousePrices {
    /// First `n` rows of the table
    pub fn head(&self, n: usize) -> DataFrame {
        self.frame.head(Some(n))
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// Load the house price dataset and its labels from `data_dir`
pub fn load_house_prices<P: AsRef<Path>>(data_dir: P) -> Result<HousePrices, DataError> {
    let data_dir = data_dir.as_ref();
    let csv_path = data_dir.join(DATASET_FILE);
    let labels_path = data_dir.join(LABELS_FILE);

    let frame = read_csv(&csv_path)?;
    let labels = read_labels(&labels_path)?;

    for required in [INDEX_COLUMN, TARGET_COLUMN] {
        if frame.column(required).is_err() {
            return Err(DataError::MissingColumn(required.to_string()));
        }
    }

    info!(
        "Loaded {} rows x {} columns from {:?}",
        frame.height(),
        frame.width(),
        csv_path
    );

    Ok(HousePrices { frame, labels })
}

/// Read a CSV file with schema inference
pub fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyDataset);
    }

    Ok(df)
}

/// Read the feature dictionary JSON
pub fn read_labels(path: &Path) -> Result<FeatureDict, DataError> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Column names of the frame in file order
pub fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Feature columns: everything but target and index, sorted by name
pub fn feature_columns(frame: &DataFrame, target: &str, index: &str) -> Vec<String> {
    let mut columns: Vec<String> = column_names(frame)
        .into_iter()
        .filter(|c| c != target && c != index)
        .collect();
    columns.sort();
    columns
}

/// Columns holding text values, which get ordinal encoding
pub fn categorical_features(frame: &DataFrame, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|name| {
            frame
                .column(name.as_str())
                .map(|c| matches!(c.dtype(), DataType::String))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "Id" => [1i64, 2, 3],
            "Street" => ["Pave", "Grvl", "Pave"],
            "LotArea" => [8450i64, 9600, 11250],
            "SalePrice" => [208500i64, 181500, 223500],
            "BldgType" => ["1Fam", "1Fam", "Duplex"],
        )
        .unwrap()
    }

    #[test]
    fn test_feature_columns_sorted_without_target_and_index() {
        let df = sample_frame();
        let cols = feature_columns(&df, TARGET_COLUMN, INDEX_COLUMN);
        assert_eq!(cols, vec!["BldgType", "LotArea", "Street"]);
    }

    #[test]
    fn test_categorical_features_detects_strings() {
        let df = sample_frame();
        let cols = feature_columns(&df, TARGET_COLUMN, INDEX_COLUMN);
        let cats = categorical_features(&df, &cols);
        assert_eq!(cats, vec!["BldgType", "Street"]);
    }

    #[test]
    fn test_load_missing_directory() {
        let err = load_house_prices("does/not/exist").unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[test]
    fn test_load_bundled_dataset() {
        let data = load_house_prices(DEFAULT_DATA_DIR).unwrap();
        assert!(data.height() > 100);
        assert_eq!(data.head(3).height(), 3);
        assert!(data.labels.contains_key("GrLivArea"));
    }
}
