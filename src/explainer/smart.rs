//! Compiled explanations of a fitted forest over a set of rows

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::shap::{forest_expected_value, forest_shap};
use super::ExplainError;
use crate::data::{Dataset, FeatureDict, FeatureValue, OrdinalEncoder};
use crate::model::{calculate_metrics, ModelError, RandomForestRegressor};
use crate::models::{
    ContributionPlot, ContributionPoint, ExplainerSummary, FeatureImportance, LocalContribution,
    LocalExplanation, ModelInfo, PredictionRow,
};

/// Predictions keyed by row id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predictions {
    pub ids: Vec<i64>,
    pub values: Vec<f64>,
}

impl Predictions {
    pub fn new(ids: Vec<i64>, values: Vec<f64>) -> Result<Self, ExplainError> {
        if ids.len() != values.len() {
            return Err(ExplainError::PredictionMismatch {
                expected: ids.len(),
                actual: values.len(),
            });
        }
        Ok(Self { ids, values })
    }

    /// Predict every row of `x`, keeping its ids
    pub fn from_model(model: &RandomForestRegressor, x: &Dataset) -> Result<Self, ModelError> {
        Ok(Self {
            ids: x.ids.clone(),
            values: model.predict(x)?,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Compiled {
    feature_names: Vec<String>,
    categorical: Vec<bool>,
    ids: Vec<i64>,
    x: Vec<Vec<f64>>,
    x_init: Vec<Vec<FeatureValue>>,
    y_true: Option<Vec<f64>>,
    y_pred: Vec<f64>,
    contributions: Vec<Vec<f64>>,
    expected_value: f64,
    mdi: Vec<f64>,
    model: ModelInfo,
    compiled_at: DateTime<Utc>,
}

/// Explainer over a fitted forest
///
/// Create with a feature dictionary, then [`compile`](Self::compile) it with
/// the rows to explain. Queries before compiling return
/// [`ExplainError::NotCompiled`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartExplainer {
    features_dict: FeatureDict,
    compiled: Option<Compiled>,
}

impl SmartExplainer {
    pub fn new(features_dict: FeatureDict) -> Self {
        Self {
            features_dict,
            compiled: None,
        }
    }

    /// Compute contributions of `model` for every row of `x`
    ///
    /// `preprocessing` decodes encoded categories back to their original
    /// values for display. When `y_pred` is absent predictions are taken
    /// from the model.
    pub fn compile(
        &mut self,
        x: &Dataset,
        model: &RandomForestRegressor,
        preprocessing: Option<&OrdinalEncoder>,
        y_pred: Option<Predictions>,
    ) -> Result<(), ExplainError> {
        if !model.is_fitted() {
            return Err(ModelError::NotFitted.into());
        }
        if x.n_features() != model.n_features() {
            return Err(ModelError::FeatureMismatch {
                expected: model.n_features(),
                actual: x.n_features(),
            }
            .into());
        }
        if let Some(row) = x.features.iter().find(|r| r.len() != model.n_features()) {
            return Err(ModelError::FeatureMismatch {
                expected: model.n_features(),
                actual: row.len(),
            }
            .into());
        }

        let y_pred = match y_pred {
            Some(p) => p,
            None => Predictions::from_model(model, x)?,
        };
        if y_pred.len() != x.n_samples() {
            return Err(ExplainError::PredictionMismatch {
                expected: x.n_samples(),
                actual: y_pred.len(),
            });
        }
        if let Some(position) = x.ids.iter().zip(&y_pred.ids).position(|(a, b)| a != b) {
            return Err(ExplainError::IndexMismatch { position });
        }

        info!("Computing contributions for {} rows", x.n_samples());
        let contributions: Vec<Vec<f64>> = x
            .features
            .par_iter()
            .map(|row| forest_shap(model, row))
            .collect();

        let x_init = x
            .features
            .iter()
            .map(|row| match preprocessing {
                Some(encoder) => encoder.inverse_row(&x.feature_names, row),
                None => row.iter().map(|&v| FeatureValue::Number(v)).collect(),
            })
            .collect();

        let categorical = x
            .feature_names
            .iter()
            .map(|f| preprocessing.is_some_and(|e| e.is_categorical(f)))
            .collect();

        let y_true = (x.labels.len() == x.n_samples()).then(|| x.labels.clone());

        let config = model.config();
        self.compiled = Some(Compiled {
            feature_names: x.feature_names.clone(),
            categorical,
            ids: x.ids.clone(),
            x: x.features.clone(),
            x_init,
            y_true,
            y_pred: y_pred.values,
            contributions,
            expected_value: forest_expected_value(model),
            mdi: model.feature_importances().to_vec(),
            model: ModelInfo {
                kind: "RandomForestRegressor".to_string(),
                n_estimators: config.n_estimators,
                min_samples_leaf: config.min_samples_leaf,
                max_depth: config.max_depth,
                oob_score: model.oob_score(),
            },
            compiled_at: Utc::now(),
        });

        Ok(())
    }

    fn compiled(&self) -> Result<&Compiled, ExplainError> {
        self.compiled.as_ref().ok_or(ExplainError::NotCompiled)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Dictionary label of a feature, defaulting to its name
    pub fn label(&self, feature: &str) -> String {
        self.features_dict
            .get(feature)
            .cloned()
            .unwrap_or_else(|| feature.to_string())
    }

    pub fn features_dict(&self) -> &FeatureDict {
        &self.features_dict
    }

    /// Explained row ids, in order
    pub fn ids(&self) -> Result<&[i64], ExplainError> {
        Ok(&self.compiled()?.ids)
    }

    pub fn expected_value(&self) -> Result<f64, ExplainError> {
        Ok(self.compiled()?.expected_value)
    }

    /// Mean absolute contribution per feature, sorted descending
    pub fn features_importance(&self) -> Result<Vec<FeatureImportance>, ExplainError> {
        let c = self.compiled()?;
        let n_features = c.feature_names.len();

        let mut mean_abs = vec![0.0; n_features];
        for row in &c.contributions {
            for (acc, v) in mean_abs.iter_mut().zip(row) {
                *acc += v.abs();
            }
        }
        let total: f64 = mean_abs.iter().sum();

        let mut importances: Vec<FeatureImportance> = c
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, feature)| FeatureImportance {
                feature: feature.clone(),
                label: self.label(feature),
                importance: if total > 0.0 { mean_abs[j] / total } else { 0.0 },
                mdi: c.mdi.get(j).copied().unwrap_or(0.0),
            })
            .collect();

        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(importances)
    }

    /// Contribution of `feature` against its value for every row
    pub fn contribution_plot(&self, feature: &str) -> Result<ContributionPlot, ExplainError> {
        let c = self.compiled()?;
        let j = c
            .feature_names
            .iter()
            .position(|f| f == feature)
            .ok_or_else(|| ExplainError::UnknownFeature(feature.to_string()))?;

        let points = (0..c.ids.len())
            .map(|i| ContributionPoint {
                id: c.ids[i],
                value: c.x_init[i][j].clone(),
                encoded: c.x[i][j],
                contribution: c.contributions[i][j],
                prediction: c.y_pred[i],
            })
            .collect();

        Ok(ContributionPlot {
            feature: feature.to_string(),
            label: self.label(feature),
            categorical: c.categorical[j],
            points,
        })
    }

    /// Strongest contributions to the prediction of row `id`
    pub fn local_plot(
        &self,
        id: i64,
        max_contrib: Option<usize>,
    ) -> Result<LocalExplanation, ExplainError> {
        let c = self.compiled()?;
        let i = self.position(id)?;

        let all = self.sorted_contributions(c, i);
        let keep = max_contrib.unwrap_or(all.len()).min(all.len());
        let other_features = (keep < all.len())
            .then(|| all[keep..].iter().map(|lc| lc.contribution).sum::<f64>());

        Ok(LocalExplanation {
            id,
            prediction: c.y_pred[i],
            y_true: c.y_true.as_ref().map(|y| y[i]),
            expected_value: c.expected_value,
            contributions: all.into_iter().take(keep).collect(),
            other_features,
        })
    }

    /// One row per prediction with its `max_contrib` strongest contributions
    pub fn to_table(&self, max_contrib: usize) -> Result<Vec<PredictionRow>, ExplainError> {
        let c = self.compiled()?;

        Ok((0..c.ids.len())
            .map(|i| PredictionRow {
                id: c.ids[i],
                prediction: c.y_pred[i],
                y_true: c.y_true.as_ref().map(|y| y[i]),
                contributions: self
                    .sorted_contributions(c, i)
                    .into_iter()
                    .take(max_contrib)
                    .collect(),
            })
            .collect())
    }

    /// Dataset, model and accuracy overview
    pub fn summary(&self) -> Result<ExplainerSummary, ExplainError> {
        let c = self.compiled()?;
        let n_rows = c.ids.len();

        Ok(ExplainerSummary {
            n_rows,
            n_features: c.feature_names.len(),
            features: c.feature_names.clone(),
            categorical_features: c
                .feature_names
                .iter()
                .zip(&c.categorical)
                .filter(|(_, cat)| **cat)
                .map(|(f, _)| f.clone())
                .collect(),
            expected_value: c.expected_value,
            prediction_mean: if n_rows > 0 {
                c.y_pred.iter().sum::<f64>() / n_rows as f64
            } else {
                0.0
            },
            model: c.model.clone(),
            metrics: c.y_true.as_ref().map(|y| calculate_metrics(&c.y_pred, y)),
            compiled_at: c.compiled_at,
        })
    }

    /// Write the explainer as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ExplainError> {
        let path = path.as_ref();
        let content = serde_json::to_string(self)?;
        fs::write(path, content).map_err(|source| ExplainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved explainer to {:?}", path);
        Ok(())
    }

    /// Read an explainer written by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExplainError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ExplainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn position(&self, id: i64) -> Result<usize, ExplainError> {
        self.compiled()?
            .ids
            .iter()
            .position(|&i| i == id)
            .ok_or(ExplainError::UnknownId(id))
    }

    fn sorted_contributions(&self, c: &Compiled, i: usize) -> Vec<LocalContribution> {
        let mut contributions: Vec<LocalContribution> = c
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, feature)| LocalContribution {
                feature: feature.clone(),
                label: self.label(feature),
                value: c.x_init[i][j].clone(),
                contribution: c.contributions[i][j],
            })
            .collect();

        contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        contributions
    }
}
