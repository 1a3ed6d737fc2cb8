//! Run Configuration
//!
//! Aggregates the settings of every pipeline stage for one submission run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::indexer::IndexerConfig;
use crate::dataset::split::SplitConfig;
use crate::dataset::transform::PreprocessConfig;
use crate::inference::engine::InferenceConfig;
use crate::utils::error::{Result, SubmissionError};

/// Default directory for submission files
pub const DEFAULT_OUTPUT_DIR: &str = "submissions";

/// Configuration for one submission run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Folder containing `train/` and `test/`
    pub data_dir: PathBuf,
    /// Pretrained weight artifact
    pub weights_path: PathBuf,
    /// Where submission files are written
    pub output_dir: PathBuf,
    pub indexer: IndexerConfig,
    pub split: SplitConfig,
    pub preprocess: PreprocessConfig,
    pub inference: InferenceConfig,
}

impl SubmissionConfig {
    /// Defaults for everything except the two required paths
    pub fn new(data_dir: impl Into<PathBuf>, weights_path: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            weights_path: weights_path.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            indexer: IndexerConfig::default(),
            split: SplitConfig::default(),
            preprocess: PreprocessConfig::default(),
            inference: InferenceConfig::default(),
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    /// Check every stage's settings
    pub fn validate(&self) -> Result<()> {
        if self.indexer.file_name.is_empty() {
            return Err(SubmissionError::Config(
                "Sample file name must not be empty".to_string(),
            ));
        }
        self.split.validate()?;
        self.preprocess.validate()?;
        self.inference.validate()?;
        Ok(())
    }
}
