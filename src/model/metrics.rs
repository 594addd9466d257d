//! Regression metrics
//!
//! Calculate MAE, RMSE and R² of predictions against known targets.

use serde::{Deserialize, Serialize};

/// Regression evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub n_samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Mean absolute percentage error
    pub mape: f64,
}

/// Calculate metrics from predictions and labels of equal length
pub fn calculate_metrics(predictions: &[f64], labels: &[f64]) -> RegressionMetrics {
    let n = predictions.len().min(labels.len());
    if n == 0 {
        return RegressionMetrics::default();
    }

    let pairs = || predictions.iter().zip(labels.iter()).take(n);

    let mae = pairs().map(|(p, l)| (p - l).abs()).sum::<f64>() / n as f64;
    let mse = pairs().map(|(p, l)| (p - l).powi(2)).sum::<f64>() / n as f64;

    let (ape_sum, ape_count) = pairs()
        .filter(|(_, l)| **l != 0.0)
        .fold((0.0, 0usize), |(s, c), (p, l)| (s + ((p - l) / l).abs(), c + 1));
    let mape = if ape_count > 0 {
        ape_sum / ape_count as f64
    } else {
        0.0
    };

    RegressionMetrics {
        n_samples: n,
        mae,
        rmse: mse.sqrt(),
        r2: r2_score(&predictions[..n], &labels[..n]),
        mape,
    }
}

/// Coefficient of determination
pub fn r2_score(predictions: &[f64], labels: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let mean = labels.iter().sum::<f64>() / labels.len() as f64;

    let ss_res: f64 = predictions
        .iter()
        .zip(labels.iter())
        .map(|(p, l)| (l - p).powi(2))
        .sum();
    let ss_tot: f64 = labels.iter().map(|l| (l - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}
