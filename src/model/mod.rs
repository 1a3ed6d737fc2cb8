//! Model module: classifier capabilities and the bundled CNN
//!
//! The pipeline only relies on two capabilities:
//! - [`Classifier`]: turn a batch of images into per-class scores
//! - [`ClassifierLoader`]: build a classifier from a weight artifact
//!
//! [`CompactRecorderLoader`] implements the loader for [`UsgClassifier`]
//! checkpoints written with Burn's `CompactRecorder` (`.mpk` files).

pub mod cnn;

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{backend::Backend, Tensor};
use tracing::{debug, info};

use crate::utils::error::{Result, SubmissionError};

// Re-export main types for convenience
pub use cnn::{UsgClassifier, UsgClassifierConfig};

/// Extension CompactRecorder writes and expects
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// A trained model that scores image batches
pub trait Classifier<B: Backend> {
    /// `[batch, channels, height, width]` images to `[batch, num_classes]` scores
    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    fn num_classes(&self) -> usize;
}

/// Builds a classifier from a weight artifact
pub trait ClassifierLoader<B: Backend> {
    type Model: Classifier<B>;

    fn load(&self, weights: &Path, device: &B::Device) -> Result<Self::Model>;
}

/// Locate the weight artifact for `path`.
///
/// CompactRecorder appends `.mpk` when saving, so both `model` and
/// `model.mpk` name the same checkpoint.
pub fn resolve_weights(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let with_extension = PathBuf::from(format!("{}.{}", path.display(), WEIGHTS_EXTENSION));
    if with_extension.is_file() {
        return Ok(with_extension);
    }

    Err(SubmissionError::WeightsNotFound(path.to_path_buf()))
}

/// Path of the JSON model config stored next to a checkpoint
pub fn config_sidecar(weights: &Path) -> PathBuf {
    weights.with_extension("json")
}

/// Loads [`UsgClassifier`] checkpoints written by `CompactRecorder`
#[derive(Debug, Clone)]
pub struct CompactRecorderLoader {
    /// Architecture used when the checkpoint has no config sidecar
    pub default_config: UsgClassifierConfig,
}

impl Default for CompactRecorderLoader {
    fn default() -> Self {
        Self::new(UsgClassifierConfig::new())
    }
}

impl CompactRecorderLoader {
    pub fn new(default_config: UsgClassifierConfig) -> Self {
        Self { default_config }
    }

    /// Read the sidecar config if present, the default otherwise
    pub fn model_config(&self, weights: &Path) -> Result<UsgClassifierConfig> {
        let sidecar = config_sidecar(weights);
        if !sidecar.is_file() {
            debug!("No model config at {:?}, using defaults", sidecar);
            return Ok(self.default_config.clone());
        }

        let contents = std::fs::read_to_string(&sidecar)?;
        serde_json::from_str(&contents).map_err(|e| {
            SubmissionError::Model(format!("Invalid model config {:?}: {}", sidecar, e))
        })
    }
}

impl<B: Backend> ClassifierLoader<B> for CompactRecorderLoader {
    type Model = UsgClassifier<B>;

    fn load(&self, weights: &Path, device: &B::Device) -> Result<Self::Model> {
        let weights = resolve_weights(weights)?;
        if weights.extension().and_then(|e| e.to_str()) != Some(WEIGHTS_EXTENSION) {
            return Err(SubmissionError::Model(format!(
                "Expected a .{} checkpoint, got {:?}",
                WEIGHTS_EXTENSION, weights
            )));
        }

        let config = self.model_config(&weights)?;
        info!(
            "Loading model from {:?} ({} classes, base filters {})",
            weights, config.num_classes, config.base_filters
        );

        let recorder = CompactRecorder::new();
        UsgClassifier::new(&config, device)
            .load_file(weights.clone(), &recorder, device)
            .map_err(|e| SubmissionError::Model(format!("Failed to load {:?}: {:?}", weights, e)))
    }
}
