//! Numeric dataset built from an encoded frame, and the train/test split

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::DataError;

/// Feature matrix with labels and row ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Feature matrix (n_samples x n_features)
    pub features: Vec<Vec<f64>>,
    /// Target values
    pub labels: Vec<f64>,
    /// Feature names, in column order of `features`
    pub feature_names: Vec<String>,
    /// Row index values
    pub ids: Vec<i64>,
}

/// Train/test split result
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            ..Default::default()
        }
    }

    /// Build from an encoded frame. All `features` and `target` must be numeric
    /// and non-null.
    pub fn from_frame(
        frame: &DataFrame,
        features: &[String],
        target: &str,
        index: &str,
    ) -> Result<Self, DataError> {
        let n = frame.height();
        if n == 0 {
            return Err(DataError::EmptyDataset);
        }

        let ids = numeric_column(frame, index)?
            .into_iter()
            .map(|v| v as i64)
            .collect();
        let labels = numeric_column(frame, target)?;

        let mut matrix = vec![Vec::with_capacity(features.len()); n];
        for name in features {
            let values = numeric_column(frame, name)?;
            for (row, value) in matrix.iter_mut().zip(values) {
                row.push(value);
            }
        }

        Ok(Self {
            features: matrix,
            labels,
            feature_names: features.to_vec(),
            ids,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Add a sample
    pub fn add_sample(&mut self, features: Vec<f64>, label: f64, id: i64) {
        assert_eq!(features.len(), self.feature_names.len());
        self.features.push(features);
        self.labels.push(label);
        self.ids.push(id);
    }

    /// Index of a feature by name
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|f| f == name)
    }

    /// Row position of an id
    pub fn position(&self, id: i64) -> Option<usize> {
        self.ids.iter().position(|&i| i == id)
    }

    /// Shuffled split; `train_size` is the fraction of rows kept for training
    pub fn train_test_split(&self, train_size: f64, seed: u64) -> Result<Split, DataError> {
        if !(train_size > 0.0 && train_size < 1.0) {
            return Err(DataError::InvalidSplit(format!(
                "train_size must be between 0 and 1, got {}",
                train_size
            )));
        }

        let n = self.n_samples();
        let n_test = ((1.0 - train_size) * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(DataError::InvalidSplit(format!(
                "train_size {} leaves an empty set for {} samples",
                train_size, n
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);

        let (test_indices, train_indices) = indices.split_at(n_test);

        Ok(Split {
            train: self.subset(train_indices),
            test: self.subset(test_indices),
        })
    }

    /// Create a subset of the dataset by row positions
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
        }
    }
}

fn numeric_column(frame: &DataFrame, name: &str) -> Result<Vec<f64>, DataError> {
    let column = frame
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))?;

    if !column.dtype().is_numeric() {
        return Err(DataError::NonNumeric(name.to_string()));
    }
    if column.null_count() > 0 {
        return Err(DataError::MissingValue(name.to_string()));
    }

    let as_float = column.cast(&DataType::Float64)?;
    Ok(as_float.f64()?.into_no_null_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset(n: usize) -> Dataset {
        let mut dataset = Dataset::new(vec!["x".to_string()]);
        for i in 0..n {
            dataset.add_sample(vec![i as f64], i as f64 * 2.0, 1000 + i as i64);
        }
        dataset
    }

    #[test]
    fn test_from_frame() {
        let df = df!(
            "Id" => [10i64, 11, 12],
            "GrLivArea" => [1710i64, 1262, 1786],
            "Street" => [1i64, 1, 2],
            "SalePrice" => [208500.0, 181500.0, 223500.0],
        )
        .unwrap();

        let features = vec!["GrLivArea".to_string(), "Street".to_string()];
        let dataset = Dataset::from_frame(&df, &features, "SalePrice", "Id").unwrap();

        assert_eq!(dataset.n_samples(), 3);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.ids, vec![10, 11, 12]);
        assert_eq!(dataset.features[1], vec![1262.0, 1.0]);
        assert_eq!(dataset.position(12), Some(2));
    }

    #[test]
    fn test_from_frame_rejects_text() {
        let df = df!(
            "Id" => [1i64, 2],
            "Street" => ["Pave", "Grvl"],
            "SalePrice" => [1.0, 2.0],
        )
        .unwrap();

        let err = Dataset::from_frame(&df, &["Street".to_string()], "SalePrice", "Id").unwrap_err();
        assert!(matches!(err, DataError::NonNumeric(_)));
    }

    #[test]
    fn test_from_frame_rejects_nulls() {
        let df = df!(
            "Id" => [1i64, 2],
            "LotFrontage" => [Some(65.0), None],
            "SalePrice" => [1.0, 2.0],
        )
        .unwrap();

        let err =
            Dataset::from_frame(&df, &["LotFrontage".to_string()], "SalePrice", "Id").unwrap_err();
        assert!(matches!(err, DataError::MissingValue(_)));
    }

    #[test]
    fn test_split_sizes() {
        let dataset = sample_dataset(10);
        let split = dataset.train_test_split(0.75, 42).unwrap();

        // ceil(0.25 * 10) = 3
        assert_eq!(split.test.n_samples(), 3);
        assert_eq!(split.train.n_samples(), 7);

        let mut all_ids: Vec<i64> = split.train.ids.iter().chain(&split.test.ids).copied().collect();
        all_ids.sort();
        assert_eq!(all_ids, dataset.ids);
    }

    #[test]
    fn test_split_keeps_rows_aligned() {
        let dataset = sample_dataset(20);
        let split = dataset.train_test_split(0.75, 7).unwrap();

        for (i, &id) in split.test.ids.iter().enumerate() {
            let original = (id - 1000) as f64;
            assert_eq!(split.test.features[i][0], original);
            assert_eq!(split.test.labels[i], original * 2.0);
        }
    }

    #[test]
    fn test_split_is_seeded() {
        let dataset = sample_dataset(50);
        let a = dataset.train_test_split(0.75, 1).unwrap();
        let b = dataset.train_test_split(0.75, 1).unwrap();
        assert_eq!(a.test.ids, b.test.ids);
    }

    #[test]
    fn test_split_invalid_size() {
        let dataset = sample_dataset(10);
        assert!(dataset.train_test_split(0.0, 1).is_err());
        assert!(dataset.train_test_split(1.0, 1).is_err());
        assert!(sample_dataset(1).train_test_split(0.75, 1).is_err());
    }
}
