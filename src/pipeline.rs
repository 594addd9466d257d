//! End-to-end run: load, encode, split, fit, predict, explain

use thiserror::Error;
use tracing::info;

use crate::config::PipelineConfig;
use crate::data::{
    categorical_features, feature_columns, load_house_prices, DataError, Dataset, HousePrices,
    OrdinalEncoder, Split, INDEX_COLUMN, TARGET_COLUMN,
};
use crate::explainer::{ExplainError, Predictions, SmartExplainer};
use crate::model::{calculate_metrics, ModelError, RandomForestRegressor, RegressionMetrics};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Explain(#[from] ExplainError),
}

/// Everything produced by [`run`]
pub struct PipelineOutput {
    pub data: HousePrices,
    pub encoder: OrdinalEncoder,
    pub split: Split,
    pub model: RandomForestRegressor,
    pub predictions: Predictions,
    pub metrics: RegressionMetrics,
    pub explainer: SmartExplainer,
}

/// Run the whole pipeline on the bundled dataset
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    let data = load_house_prices(&config.data_dir)?;

    if config.verbose {
        println!("{}", data.head(3));
        println!("house_dict: {:?}", data.labels);
    }

    let features = feature_columns(&data.frame, TARGET_COLUMN, INDEX_COLUMN);
    let categorical = categorical_features(&data.frame, &features);
    info!(
        "{} features, {} categorical: {:?}",
        features.len(),
        categorical.len(),
        categorical
    );

    let (encoder, encoded) = OrdinalEncoder::fit_transform(&data.frame, &categorical)?;
    let dataset = Dataset::from_frame(&encoded, &features, TARGET_COLUMN, INDEX_COLUMN)?;

    let split = dataset.train_test_split(config.train_size, config.seed)?;
    info!(
        "Split: {} train / {} test rows",
        split.train.n_samples(),
        split.test.n_samples()
    );

    let mut model = RandomForestRegressor::new(config.forest_config());
    model.fit(&split.train)?;

    let predictions = Predictions::from_model(&model, &split.test)?;
    let metrics = calculate_metrics(&predictions.values, &split.test.labels);
    info!(
        "Test metrics: R2 {:.3}, MAE {:.0}, RMSE {:.0}",
        metrics.r2, metrics.mae, metrics.rmse
    );

    let mut explainer = SmartExplainer::new(data.labels.clone());
    explainer.compile(
        &split.test,
        &model,
        Some(&encoder),
        Some(predictions.clone()),
    )?;

    Ok(PipelineOutput {
        data,
        encoder,
        split,
        model,
        predictions,
        metrics,
        explainer,
    })
}
