//! CART regression tree
//!
//! Nodes live in a flat arena. Node 0 is the root. Every node keeps the
//! weighted mean of its training targets (`value`) and the total sample
//! weight that reached it (`cover`), which the explainer needs to attribute
//! predictions to features.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Relative impurity below which a node is not split further
const MIN_IMPURITY: f64 = 1e-12;
/// Relative tolerance for treating two sorted feature values as equal
const FEATURE_EPS: f64 = 1e-7;

/// Regression tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until leaves are pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for feature sampling
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

/// Split of an internal node; `x[feature] <= threshold` goes left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRule {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Weighted mean of the targets reaching this node
    pub value: f64,
    /// Total sample weight reaching this node
    pub cover: f64,
    /// Number of distinct training rows reaching this node
    pub n_samples: usize,
    /// Weighted variance of the targets
    pub impurity: f64,
    pub split: Option<SplitRule>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Weighted target statistics of a set of rows
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    weight: f64,
    sum: f64,
    sum_sq: f64,
}

impl Stats {
    fn add(&mut self, y: f64, w: f64) {
        self.weight += w;
        self.sum += w * y;
        self.sum_sq += w * y * y;
    }

    fn sub(&self, other: &Stats) -> Stats {
        Stats {
            weight: self.weight - other.weight,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum / self.weight
        } else {
            0.0
        }
    }

    fn variance(&self) -> f64 {
        if self.weight > 0.0 {
            (self.sum_sq / self.weight - self.mean().powi(2)).max(0.0)
        } else {
            0.0
        }
    }

    /// Term maximized by the best squared-error split
    fn proxy(&self) -> f64 {
        if self.weight > 0.0 {
            self.sum * self.sum / self.weight
        } else {
            0.0
        }
    }
}

/// Candidate split found while scanning features
struct Candidate {
    feature: usize,
    threshold: f64,
    proxy: f64,
}

/// Borrowed training data
struct TrainData<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [f64],
    weights: &'a [f64],
}

/// Regression tree with squared-error criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    config: TreeConfig,
    nodes: Vec<TreeNode>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RegressionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        }
    }

    /// Train on rows with per-row weights. Rows with zero weight are ignored.
    pub fn fit(
        &mut self,
        features: &[Vec<f64>],
        labels: &[f64],
        weights: &[f64],
    ) -> Result<(), ModelError> {
        if features.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        if labels.len() != features.len() || weights.len() != features.len() {
            return Err(ModelError::LengthMismatch {
                rows: features.len(),
                labels: labels.len(),
            });
        }

        let n_features = features[0].len();
        if let Some(row) = features.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::FeatureMismatch {
                expected: n_features,
                actual: row.len(),
            });
        }

        let indices: Vec<usize> = (0..features.len()).filter(|&i| weights[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(ModelError::EmptyDataset);
        }

        self.n_features = n_features;
        self.nodes.clear();
        self.importances = vec![0.0; n_features];

        let data = TrainData {
            features,
            labels,
            weights,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.build(&data, indices, 0, &mut rng);

        Ok(())
    }

    /// Grow the subtree for `indices`, returning its node id
    fn build(
        &mut self,
        data: &TrainData<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let mut stats = Stats::default();
        for &i in &indices {
            stats.add(data.labels[i], data.weights[i]);
        }

        let node_id = self.nodes.len();
        self.nodes.push(TreeNode {
            value: stats.mean(),
            cover: stats.weight,
            n_samples: indices.len(),
            impurity: stats.variance(),
            split: None,
        });

        let n = indices.len();
        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || n < 2
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || stats.variance() <= MIN_IMPURITY * stats.mean().powi(2).max(1.0)
        {
            return node_id;
        }

        let Some(best) = self.find_best_split(data, &indices, &stats, rng) else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data.features[i][best.feature] <= best.threshold);

        let mut left_stats = Stats::default();
        for &i in &left_idx {
            left_stats.add(data.labels[i], data.weights[i]);
        }
        let right_stats = stats.sub(&left_stats);

        // Weighted impurity decrease
        self.importances[best.feature] += stats.weight * stats.variance()
            - left_stats.weight * left_stats.variance()
            - right_stats.weight * right_stats.variance();

        let left = self.build(data, left_idx, depth + 1, rng);
        let right = self.build(data, right_idx, depth + 1, rng);

        self.nodes[node_id].split = Some(SplitRule {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        });

        node_id
    }

    fn find_best_split(
        &self,
        data: &TrainData<'_>,
        indices: &[usize],
        parent: &Stats,
        rng: &mut ChaCha8Rng,
    ) -> Option<Candidate> {
        if self.n_features == 0 {
            return None;
        }
        let max_features = self
            .config
            .max_features
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features);

        let mut feature_indices: Vec<usize> = (0..self.n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);

        let min_leaf = self.config.min_samples_leaf.max(1);
        let n = indices.len();
        let mut best: Option<Candidate> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

        for &feature in &feature_indices {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (data.features[i][feature], i)));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Constant feature in this node
            if sorted[n - 1].0 <= sorted[0].0 + FEATURE_EPS * sorted[0].0.abs().max(1.0) {
                continue;
            }

            let mut left = Stats::default();
            for pos in 0..n - 1 {
                let (x, i) = sorted[pos];
                left.add(data.labels[i], data.weights[i]);

                let next = sorted[pos + 1].0;
                if next <= x + FEATURE_EPS * x.abs().max(1.0) {
                    continue;
                }

                let n_left = pos + 1;
                if n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }

                let right = parent.sub(&left);
                let proxy = left.proxy() + right.proxy();

                if best.as_ref().map_or(true, |b| proxy > b.proxy) {
                    let mut threshold = (x + next) / 2.0;
                    if threshold >= next {
                        threshold = x;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        proxy,
                    });
                }
            }
        }

        best.filter(|b| b.proxy > parent.proxy())
    }

    /// Predict for a single row
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        self.nodes
            .get(self.apply(features))
            .map(|node| node.value)
            .unwrap_or(0.0)
    }

    /// Leaf node id reached by a row
    pub fn apply(&self, features: &[f64]) -> usize {
        let mut idx = 0;
        while let Some(split) = self.nodes.get(idx).and_then(|n| n.split) {
            idx = if features[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
        idx
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.first()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Impurity decrease per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let sum: f64 = self.importances.iter().sum();
        if sum > 0.0 {
            self.importances.iter().map(|i| i / sum).collect()
        } else {
            self.importances.clone()
        }
    }

    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, idx: usize) -> usize {
        match self.nodes.get(idx).and_then(|n| n.split) {
            None if idx < self.nodes.len() => 1,
            None => 0,
            Some(split) => 1 + self.depth_from(split.left).max(self.depth_from(split.right)),
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let labels: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        (features, labels)
    }

    #[test]
    fn test_fits_step_function() {
        let (features, labels) = step_data();
        let weights = vec![1.0; features.len()];

        let mut tree = RegressionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &weights).unwrap();

        let root = tree.root().unwrap();
        let split = root.split.unwrap();
        assert_eq!(split.feature, 0);
        assert!((split.threshold - 9.5).abs() < 1e-9);

        assert_eq!(tree.predict_one(&[3.0, 0.0]), 1.0);
        assert_eq!(tree.predict_one(&[15.0, 2.0]), 5.0);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 2);

        let importances = tree.feature_importances();
        assert!((importances[0] - 1.0).abs() < 1e-9);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_node_value_is_weighted_mean_of_children() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, ((i * 7) % 11) as f64]).collect();
        let labels: Vec<f64> = (0..40).map(|i| (i as f64).sqrt() * 3.0 + (i % 4) as f64).collect();
        let weights: Vec<f64> = (0..40).map(|i| (i % 3) as f64).collect();

        let mut tree = RegressionTree::new(TreeConfig {
            min_samples_leaf: 2,
            ..Default::default()
        });
        tree.fit(&features, &labels, &weights).unwrap();

        for node in tree.nodes() {
            if let Some(split) = node.split {
                let l = &tree.nodes()[split.left];
                let r = &tree.nodes()[split.right];
                assert!((l.cover + r.cover - node.cover).abs() < 1e-9);
                let mixed = (l.value * l.cover + r.value * r.cover) / node.cover;
                assert!((mixed - node.value).abs() < 1e-6);
                assert!(l.n_samples >= 2 && r.n_samples >= 2);
            }
        }
    }

    #[test]
    fn test_max_depth() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let labels: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let weights = vec![1.0; 64];

        let mut tree = RegressionTree::new(TreeConfig {
            max_depth: Some(3),
            ..Default::default()
        });
        tree.fit(&features, &labels, &weights).unwrap();

        assert_eq!(tree.depth(), 4);
        assert_eq!(tree.n_leaves(), 8);
    }

    #[test]
    fn test_min_samples_split() {
        let (features, labels) = step_data();
        let weights = vec![1.0; features.len()];

        let mut tree = RegressionTree::new(TreeConfig {
            min_samples_split: 21,
            ..Default::default()
        });
        tree.fit(&features, &labels, &weights).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_one(&[0.0, 0.0]), 3.0);

        let mut tree = RegressionTree::new(TreeConfig {
            min_samples_split: 20,
            ..Default::default()
        });
        tree.fit(&features, &labels, &weights).unwrap();
        assert!(tree.root().unwrap().split.is_some());
    }

    #[test]
    fn test_max_features_samples_split_candidates() {
        let (features, labels) = step_data();
        let weights = vec![1.0; features.len()];

        let root_feature = |config: TreeConfig| {
            let mut tree = RegressionTree::new(config);
            tree.fit(&features, &labels, &weights).unwrap();
            tree.root().unwrap().split.unwrap().feature
        };

        // With every feature available the step feature always wins
        for seed in 0..20 {
            assert_eq!(root_feature(TreeConfig { seed, ..Default::default() }), 0);
        }

        // With one feature per split some roots only see the noisy one
        let roots: Vec<usize> = (0..20)
            .map(|seed| {
                root_feature(TreeConfig {
                    max_features: Some(1),
                    seed,
                    ..Default::default()
                })
            })
            .collect();
        assert!(roots.contains(&0));
        assert!(roots.contains(&1));
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels = vec![3.0; 10];
        let weights = vec![1.0; 10];

        let mut tree = RegressionTree::new(TreeConfig::default());
        tree.fit(&features, &labels, &weights).unwrap();

        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_one(&[100.0]), 3.0);
    }

    #[test]
    fn test_fit_errors() {
        let mut tree = RegressionTree::new(TreeConfig::default());
        assert!(matches!(
            tree.fit(&[], &[], &[]),
            Err(ModelError::EmptyDataset)
        ));

        let features = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            tree.fit(&features, &[1.0, 2.0], &[1.0, 1.0]),
            Err(ModelError::FeatureMismatch { .. })
        ));
    }
}
