//! Pipeline and dashboard settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::DEFAULT_DATA_DIR;
use crate::model::ForestConfig;

pub const DEFAULT_TRAIN_SIZE: f64 = 0.75;
pub const DEFAULT_N_ESTIMATORS: usize = 200;
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 2;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8050;

/// Settings for the load -> encode -> split -> fit -> explain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    /// Fraction of rows used for training
    pub train_size: f64,
    pub n_estimators: usize,
    pub min_samples_leaf: usize,
    /// Seed for the split and the forest
    pub seed: u64,
    pub oob_score: bool,
    /// Print the dataset preview and feature dictionary
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            train_size: DEFAULT_TRAIN_SIZE,
            n_estimators: DEFAULT_N_ESTIMATORS,
            min_samples_leaf: DEFAULT_MIN_SAMPLES_LEAF,
            seed: DEFAULT_SEED,
            oob_score: false,
            verbose: true,
        }
    }
}

impl PipelineConfig {
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_estimators: self.n_estimators,
            min_samples_leaf: self.min_samples_leaf,
            seed: self.seed,
            oob_score: self.oob_score,
            ..Default::default()
        }
    }
}

/// Dashboard server bind address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl DashboardConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
