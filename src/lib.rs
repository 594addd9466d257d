//! House Explainer - house price regression with an explainability dashboard
//!
//! This library provides:
//! - Loading of the bundled house prices dataset and its feature dictionary
//! - Ordinal encoding of categorical columns
//! - A random forest regressor with TreeSHAP contributions
//! - A web dashboard over the compiled explanations
//!
//! # Example
//!
//! ```no_run
//! use house_explainer::config::PipelineConfig;
//! use house_explainer::pipeline;
//!
//! let output = pipeline::run(&PipelineConfig::default()).unwrap();
//! let local = output.explainer.local_plot(output.predictions.ids[0], Some(3)).unwrap();
//! println!("Predicted {:.0}", local.prediction);
//! ```

pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod explainer;
pub mod handlers;
pub mod model;
pub mod models;
pub mod pipeline;

// Re-export commonly used types
pub use config::{DashboardConfig, PipelineConfig};
pub use dashboard::{run_app, DashboardHandle};
pub use data::{load_house_prices, Dataset, HousePrices, OrdinalEncoder};
pub use explainer::{Predictions, SmartExplainer};
pub use model::{ForestConfig, RandomForestRegressor};
pub use models::{ContributionPlot, FeatureImportance, LocalExplanation};
pub use pipeline::{PipelineError, PipelineOutput};
