use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dashboard::AppState;
use crate::error::{validate_max_contrib, AppError};
use crate::data::FeatureDict;

/// Contributions shown per row when the query does not say
const DEFAULT_MAX_CONTRIB: usize = 3;

#[derive(Debug, Deserialize)]
pub struct ContribQuery {
    pub max_contrib: Option<usize>,
}

/// Feature dictionary plus the explained row ids
#[derive(Debug, Serialize, Deserialize)]
pub struct FeaturesResponse {
    pub features_dict: FeatureDict,
    pub ids: Vec<i64>,
}

/// Dataset, model and accuracy overview
pub async fn summary(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let summary = state.explainer.summary()?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Feature labels and row ids
pub async fn features(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let response = FeaturesResponse {
        features_dict: state.explainer.features_dict().clone(),
        ids: state.explainer.ids()?.to_vec(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Global feature importance
pub async fn importance(state: web::Data<Arc<AppState>>) -> Result<HttpResponse, AppError> {
    let importance = state.explainer.features_importance()?;
    Ok(HttpResponse::Ok().json(importance))
}

/// Contribution of one feature across rows
pub async fn contribution(
    state: web::Data<Arc<AppState>>,
    feature: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let plot = state.explainer.contribution_plot(&feature)?;
    Ok(HttpResponse::Ok().json(plot))
}

/// Explanation of a single prediction
pub async fn local(
    state: web::Data<Arc<AppState>>,
    id: web::Path<i64>,
    query: web::Query<ContribQuery>,
) -> Result<HttpResponse, AppError> {
    let max_contrib = query.max_contrib.map(validate_max_contrib).transpose()?;
    let local = state.explainer.local_plot(id.into_inner(), max_contrib)?;
    Ok(HttpResponse::Ok().json(local))
}

/// Every prediction with its strongest contributions
pub async fn predictions(
    state: web::Data<Arc<AppState>>,
    query: web::Query<ContribQuery>,
) -> Result<HttpResponse, AppError> {
    let max_contrib = validate_max_contrib(query.max_contrib.unwrap_or(DEFAULT_MAX_CONTRIB))?;
    let table = state.explainer.to_table(max_contrib)?;
    Ok(HttpResponse::Ok().json(table))
}
