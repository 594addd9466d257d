//! Random forest regressor

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::tree::{RegressionTree, TreeConfig};
use super::ModelError;
use crate::data::Dataset;

/// Random forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum depth of each tree (None = unlimited)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
    /// Out-of-bag score calculation
    pub oob_score: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
            seed: 42,
            oob_score: false,
        }
    }
}

/// Random forest of regression trees, predictions averaged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
    oob_score_value: Option<f64>,
}

impl RandomForestRegressor {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
            oob_score_value: None,
        }
    }

    /// Train the forest, building trees in parallel
    pub fn fit(&mut self, dataset: &Dataset) -> Result<(), ModelError> {
        if self.config.n_estimators == 0 {
            return Err(ModelError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        let n_samples = dataset.n_samples();
        let n_features = dataset.n_features();

        if dataset.labels.len() != n_samples {
            return Err(ModelError::LengthMismatch {
                rows: n_samples,
                labels: dataset.labels.len(),
            });
        }
        if let Some(row) = dataset.features.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::FeatureMismatch {
                expected: n_features,
                actual: row.len(),
            });
        }

        info!(
            "Fitting {} trees on {} samples x {} features",
            self.config.n_estimators, n_samples, n_features
        );

        let trees: Vec<RegressionTree> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|i| -> Result<RegressionTree, ModelError> {
                let seed = self.config.seed.wrapping_add(i as u64);
                let weights = if self.config.bootstrap {
                    bootstrap_weights(n_samples, seed)
                } else {
                    vec![1.0; n_samples]
                };

                let mut tree = RegressionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: self.config.max_features,
                    seed: seed.rotate_left(32),
                });
                tree.fit(&dataset.features, &dataset.labels, &weights)?;
                Ok(tree)
            })
            .collect::<Result<_, ModelError>>()?;

        self.trees = trees;
        self.feature_names = dataset.feature_names.clone();

        // Average per-tree normalized importances
        self.feature_importances = vec![0.0; n_features];
        for tree in &self.trees {
            for (acc, imp) in self
                .feature_importances
                .iter_mut()
                .zip(tree.feature_importances())
            {
                *acc += imp;
            }
        }
        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }

        if self.config.oob_score && self.config.bootstrap {
            self.oob_score_value = self.calculate_oob_score(dataset);
        }

        debug!(
            "Forest fitted: mean depth {:.1}, mean leaves {:.1}",
            self.trees.iter().map(|t| t.depth() as f64).sum::<f64>() / self.trees.len() as f64,
            self.trees.iter().map(|t| t.n_leaves() as f64).sum::<f64>() / self.trees.len() as f64
        );

        Ok(())
    }

    /// Out-of-bag R²
    fn calculate_oob_score(&self, dataset: &Dataset) -> Option<f64> {
        let n_samples = dataset.n_samples();
        let mut sums = vec![0.0; n_samples];
        let mut counts = vec![0usize; n_samples];

        for (tree_idx, tree) in self.trees.iter().enumerate() {
            let seed = self.config.seed.wrapping_add(tree_idx as u64);
            let weights = bootstrap_weights(n_samples, seed);

            for i in (0..n_samples).filter(|&i| weights[i] == 0.0) {
                sums[i] += tree.predict_one(&dataset.features[i]);
                counts[i] += 1;
            }
        }

        let (predictions, labels): (Vec<f64>, Vec<f64>) = (0..n_samples)
            .filter(|&i| counts[i] > 0)
            .map(|i| (sums[i] / counts[i] as f64, dataset.labels[i]))
            .unzip();

        if predictions.is_empty() {
            return None;
        }
        Some(super::metrics::r2_score(&predictions, &labels))
    }

    /// Predict for a single row
    pub fn predict_one(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.check_row(features)?;
        Ok(self.trees.iter().map(|t| t.predict_one(features)).sum::<f64>() / self.trees.len() as f64)
    }

    /// Predict every row of a dataset
    pub fn predict(&self, dataset: &Dataset) -> Result<Vec<f64>, ModelError> {
        dataset
            .features
            .par_iter()
            .map(|row| self.predict_one(row))
            .collect()
    }

    fn check_row(&self, features: &[f64]) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if features.len() != self.feature_names.len() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }
        Ok(())
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean decrease in impurity per feature, normalized
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Feature names with importances, sorted by importance
    pub fn feature_importance_ranking(&self) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .zip(self.feature_importances.iter())
            .map(|(n, &i)| (n.as_str(), i))
            .collect();

        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score_value
    }
}

/// Bootstrap draw expressed as per-row counts
fn bootstrap_weights(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut weights = vec![0.0; n];
    for _ in 0..n {
        weights[rng.gen_range(0..n)] += 1.0;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset(n: usize) -> Dataset {
        let mut dataset = Dataset::new(vec!["x".to_string(), "noise".to_string()]);
        for i in 0..n {
            let x = i as f64 / 10.0;
            dataset.add_sample(vec![x, ((i * 13) % 7) as f64], 2.0 * x + 1.0, i as i64);
        }
        dataset
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_estimators: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_regression() {
        let dataset = linear_dataset(200);
        let mut forest = RandomForestRegressor::new(small_config());
        forest.fit(&dataset).unwrap();

        assert_eq!(forest.trees().len(), 20);

        let predictions = forest.predict(&dataset).unwrap();
        let r2 = crate::model::metrics::r2_score(&predictions, &dataset.labels);
        assert!(r2 > 0.95, "r2 = {}", r2);

        let ranking = forest.feature_importance_ranking();
        assert_eq!(ranking[0].0, "x");
        let total: f64 = forest.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let dataset = linear_dataset(100);
        let mut a = RandomForestRegressor::new(small_config());
        let mut b = RandomForestRegressor::new(small_config());
        a.fit(&dataset).unwrap();
        b.fit(&dataset).unwrap();

        assert_eq!(a.predict(&dataset).unwrap(), b.predict(&dataset).unwrap());
    }

    #[test]
    fn test_oob_score() {
        let dataset = linear_dataset(150);
        let mut forest = RandomForestRegressor::new(ForestConfig {
            oob_score: true,
            ..small_config()
        });
        forest.fit(&dataset).unwrap();

        let oob = forest.oob_score().unwrap();
        assert!(oob > 0.9 && oob <= 1.0, "oob = {}", oob);
    }

    #[test]
    fn test_bootstrap_weights_sum_to_n() {
        let weights = bootstrap_weights(50, 3);
        assert_eq!(weights.iter().sum::<f64>(), 50.0);
        assert!(weights.iter().any(|&w| w == 0.0));
    }

    #[test]
    fn test_errors() {
        let forest = RandomForestRegressor::new(small_config());
        assert!(matches!(forest.predict_one(&[1.0, 2.0]), Err(ModelError::NotFitted)));

        let mut empty = RandomForestRegressor::new(small_config());
        assert!(matches!(
            empty.fit(&Dataset::new(vec!["x".into()])),
            Err(ModelError::EmptyDataset)
        ));

        let mut zero = RandomForestRegressor::new(ForestConfig {
            n_estimators: 0,
            ..Default::default()
        });
        assert!(matches!(
            zero.fit(&linear_dataset(10)),
            Err(ModelError::InvalidConfig(_))
        ));

        let mut forest = RandomForestRegressor::new(small_config());
        forest.fit(&linear_dataset(30)).unwrap();
        assert!(matches!(
            forest.predict_one(&[1.0]),
            Err(ModelError::FeatureMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_rows_wider_than_feature_names() {
        let dataset = Dataset {
            features: vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0], vec![7.0, 8.0]],
            labels: vec![1.0, 2.0, 3.0, 4.0],
            feature_names: vec!["x".to_string()],
            ids: vec![1, 2, 3, 4],
        };
        let mut forest = RandomForestRegressor::new(small_config());
        assert!(matches!(
            forest.fit(&dataset),
            Err(ModelError::FeatureMismatch { expected: 1, actual: 2 })
        ));
        assert!(!forest.is_fitted());
        assert!(matches!(forest.predict_one(&[1.0]), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_labels_shorter_than_rows() {
        let mut dataset = linear_dataset(10);
        dataset.labels.pop();
        let mut forest = RandomForestRegressor::new(small_config());
        assert!(matches!(
            forest.fit(&dataset),
            Err(ModelError::LengthMismatch { rows: 10, labels: 9 })
        ));
    }
}
