//! Exact path-dependent TreeSHAP
//!
//! Attributes a tree's prediction for one row to its features so that
//! `expected_value(tree) + sum(contributions) == prediction`. Node covers
//! (training weight per node) stand in for the background distribution.

use crate::model::{RandomForestRegressor, RegressionTree};

/// One step of the unique feature path from the root to the current node
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature split on at this step (None for the root placeholder)
    feature: Option<usize>,
    /// Fraction of "feature absent" paths flowing through
    zero: f64,
    /// Fraction of "feature present" paths flowing through (0 or 1)
    one: f64,
    /// Permutation weight
    weight: f64,
}

/// Expected prediction of a tree: the root value
pub fn expected_value(tree: &RegressionTree) -> f64 {
    tree.root().map(|node| node.value).unwrap_or(0.0)
}

/// SHAP values of one row for one tree
pub fn tree_shap(tree: &RegressionTree, x: &[f64]) -> Vec<f64> {
    let mut phi = vec![0.0; tree.n_features()];
    if tree.is_fitted() {
        recurse(tree, x, &mut phi, 0, &[], 1.0, 1.0, None);
    }
    phi
}

/// Expected value of a forest: mean of the tree expected values
pub fn forest_expected_value(forest: &RandomForestRegressor) -> f64 {
    let trees = forest.trees();
    if trees.is_empty() {
        return 0.0;
    }
    trees.iter().map(expected_value).sum::<f64>() / trees.len() as f64
}

/// SHAP values of one row for a forest: mean over trees
pub fn forest_shap(forest: &RandomForestRegressor, x: &[f64]) -> Vec<f64> {
    let mut phi = vec![0.0; forest.n_features()];
    let trees = forest.trees();
    if trees.is_empty() {
        return phi;
    }

    for tree in trees {
        for (acc, v) in phi.iter_mut().zip(tree_shap(tree, x)) {
            *acc += v;
        }
    }
    let n = trees.len() as f64;
    phi.iter_mut().for_each(|v| *v /= n);
    phi
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &RegressionTree,
    x: &[f64],
    phi: &mut [f64],
    node_idx: usize,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let nodes = tree.nodes();
    let node = &nodes[node_idx];

    let mut path = parent_path.to_vec();
    extend(&mut path, zero_fraction, one_fraction, feature);

    let Some(split) = node.split else {
        for i in 1..path.len() {
            let w = unwound_sum(&path, i);
            let element = path[i];
            if let Some(f) = element.feature {
                phi[f] += w * (element.one - element.zero) * node.value;
            }
        }
        return;
    };

    let (hot, cold) = if x[split.feature] <= split.threshold {
        (split.left, split.right)
    } else {
        (split.right, split.left)
    };

    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;

    // Undo an earlier split on the same feature so it is only counted once
    if let Some(k) = path.iter().position(|e| e.feature == Some(split.feature)) {
        incoming_zero = path[k].zero;
        incoming_one = path[k].one;
        unwind(&mut path, k);
    }

    let hot_zero = nodes[hot].cover / node.cover;
    let cold_zero = nodes[cold].cover / node.cover;

    recurse(
        tree,
        x,
        phi,
        hot,
        &path,
        hot_zero * incoming_zero,
        incoming_one,
        Some(split.feature),
    );
    recurse(
        tree,
        x,
        phi,
        cold,
        &path,
        cold_zero * incoming_zero,
        0.0,
        Some(split.feature),
    );
}

fn extend(path: &mut Vec<PathElement>, zero: f64, one: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero,
        one,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d = depth as f64;
    for i in (0..depth).rev() {
        let w = path[i].weight;
        path[i + 1].weight += one * w * (i as f64 + 1.0) / (d + 1.0);
        path[i].weight = zero * w * (d - i as f64) / (d + 1.0);
    }
}

fn unwind(path: &mut Vec<PathElement>, idx: usize) {
    let depth = path.len() - 1;
    let one = path[idx].one;
    let zero = path[idx].zero;
    let d = depth as f64;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * (d + 1.0) / ((fi + 1.0) * one);
            next_one = tmp - path[i].weight * zero * (d - fi) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero * (d - fi));
        }
    }

    // Weights stay in place, the removed step's fields shift down
    for i in idx..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero = path[i + 1].zero;
        path[i].one = path[i + 1].one;
    }
    path.pop();
}

/// Total permutation weight of the path with step `idx` removed
fn unwound_sum(path: &[PathElement], idx: usize) -> f64 {
    let depth = path.len() - 1;
    let one = path[idx].one;
    let zero = path[idx].zero;
    let d = depth as f64;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = next_one * (d + 1.0) / ((fi + 1.0) * one);
            total += tmp;
            next_one = path[i].weight - tmp * zero * ((d - fi) / (d + 1.0));
        } else {
            total += (path[i].weight / zero) / ((d - fi) / (d + 1.0));
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use crate::model::{ForestConfig, TreeConfig};

    fn fitted_tree(features: &[Vec<f64>], labels: &[f64]) -> RegressionTree {
        let mut tree = RegressionTree::new(TreeConfig::default());
        tree.fit(features, labels, &vec![1.0; labels.len()]).unwrap();
        tree
    }

    #[test]
    fn test_single_split_attribution() {
        // y = 10 when x0 > 0, else 0; x1 is irrelevant
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = vec![0.0, 0.0, 10.0, 10.0];
        let tree = fitted_tree(&features, &labels);

        assert_eq!(expected_value(&tree), 5.0);

        let phi = tree_shap(&tree, &[1.0, 0.0]);
        assert!((phi[0] - 5.0).abs() < 1e-9);
        assert!(phi[1].abs() < 1e-9);

        let phi = tree_shap(&tree, &[0.0, 1.0]);
        assert!((phi[0] + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_and_function_splits_credit_evenly() {
        // y = 1 only when both features are 1
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for a in 0..2 {
            for b in 0..2 {
                for _ in 0..3 {
                    features.push(vec![a as f64, b as f64]);
                    labels.push(if a == 1 && b == 1 { 1.0 } else { 0.0 });
                }
            }
        }
        let tree = fitted_tree(&features, &labels);

        let phi = tree_shap(&tree, &[1.0, 1.0]);
        assert!((phi[0] - phi[1]).abs() < 1e-9);
        assert!((expected_value(&tree) + phi[0] + phi[1] - 1.0).abs() < 1e-9);
        // E[y] = 0.25, each feature gets half of 0.75
        assert!((phi[0] - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_feature_local_accuracy() {
        // Deep tree splitting the same feature several times
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![i as f64, ((i * 11) % 5) as f64, ((i * 3) % 4) as f64])
            .collect();
        let labels: Vec<f64> = features
            .iter()
            .map(|r| (r[0] * 0.7).sin() * 10.0 + r[1] * 2.0 - r[2])
            .collect();
        let tree = fitted_tree(&features, &labels);

        for row in &features {
            let phi = tree_shap(&tree, row);
            let total = expected_value(&tree) + phi.iter().sum::<f64>();
            assert!((total - tree.predict_one(row)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_forest_local_accuracy() {
        let mut dataset = Dataset::new(vec!["a".into(), "b".into(), "c".into()]);
        for i in 0..80 {
            let a = (i % 10) as f64;
            let b = ((i * 7) % 13) as f64;
            let c = (i / 20) as f64;
            dataset.add_sample(vec![a, b, c], a * 3.0 + b * b * 0.5 - c * 4.0, i);
        }

        let mut forest = RandomForestRegressor::new(ForestConfig {
            n_estimators: 15,
            ..Default::default()
        });
        forest.fit(&dataset).unwrap();

        let base = forest_expected_value(&forest);
        for row in dataset.features.iter().take(20) {
            let phi = forest_shap(&forest, row);
            let prediction = forest.predict_one(row).unwrap();
            assert!((base + phi.iter().sum::<f64>() - prediction).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unfitted_tree_has_zero_values() {
        let tree = RegressionTree::new(TreeConfig::default());
        assert!(tree_shap(&tree, &[]).is_empty());
        assert_eq!(expected_value(&tree), 0.0);
    }
}
