use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::FeatureValue;
use crate::model::RegressionMetrics;

/// Global importance of one feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub label: String,
    /// Share of mean absolute contribution (sums to 1 over features)
    pub importance: f64,
    /// Mean decrease in impurity from the forest
    pub mdi: f64,
}

/// One row of a contribution plot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionPoint {
    pub id: i64,
    /// Original value (category decoded)
    pub value: FeatureValue,
    /// Value seen by the model
    pub encoded: f64,
    pub contribution: f64,
    pub prediction: f64,
}

/// Contribution of one feature across all explained rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionPlot {
    pub feature: String,
    pub label: String,
    pub categorical: bool,
    pub points: Vec<ContributionPoint>,
}

/// Contribution of one feature to one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalContribution {
    pub feature: String,
    pub label: String,
    pub value: FeatureValue,
    pub contribution: f64,
}

/// Explanation of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExplanation {
    pub id: i64,
    pub prediction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_true: Option<f64>,
    pub expected_value: f64,
    /// Strongest contributions, sorted by absolute value
    pub contributions: Vec<LocalContribution>,
    /// Sum of the contributions left out of `contributions`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_features: Option<f64>,
}

/// Prediction with its top contributions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub id: i64,
    pub prediction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_true: Option<f64>,
    pub contributions: Vec<LocalContribution>,
}

/// Fitted model description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub kind: String,
    pub n_estimators: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
    pub oob_score: Option<f64>,
}

/// Overview of a compiled explainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainerSummary {
    pub n_rows: usize,
    pub n_features: usize,
    pub features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub expected_value: f64,
    pub prediction_mean: f64,
    pub model: ModelInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RegressionMetrics>,
    pub compiled_at: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub compiled: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
