//! Inference Engine
//!
//! Runs a classifier over a [`SampleDataset`] through Burn's data loader.
//! Worker threads decode and preprocess samples while the classifier scores
//! the batches they deliver. Batches can arrive out of order across
//! workers, so scores are slotted back by position and the output always
//! follows the input order.

use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::burn_dataset::{SampleBatcher, SampleDataset};
use crate::model::Classifier;
use crate::utils::error::{Result, SubmissionError};
use crate::utils::logging::ProgressLogger;

/// Default number of samples per batch
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Default number of data loader worker threads
pub const DEFAULT_NUM_WORKERS: usize = 2;

/// Data loader settings for inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub batch_size: usize,
    pub num_workers: usize,
    /// Must stay false: predictions are matched to samples by order
    pub shuffle: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            num_workers: DEFAULT_NUM_WORKERS,
            shuffle: false,
        }
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SubmissionError::Config("Batch size must be positive".to_string()));
        }
        if self.num_workers == 0 {
            return Err(SubmissionError::Config(
                "Number of workers must be positive".to_string(),
            ));
        }
        if self.shuffle {
            return Err(SubmissionError::Config(
                "Shuffling is not allowed during inference".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scores datasets with a classifier on one device
#[derive(Debug, Clone)]
pub struct InferenceEngine<B: Backend> {
    config: InferenceConfig,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    pub fn new(config: InferenceConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, device })
    }

    /// One score vector per sample of `dataset`, in dataset order
    pub fn predict<M: Classifier<B>>(
        &self,
        model: &M,
        dataset: SampleDataset,
        operation: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let total = dataset.len();
        if total == 0 {
            info!("{}: no samples", operation);
            return Ok(Vec::new());
        }

        info!(
            "{}: {} samples (batch size {}, {} workers)",
            operation, total, self.config.batch_size, self.config.num_workers
        );

        let paths: Vec<_> = (0..total).filter_map(|i| dataset.path(i).cloned()).collect();

        let loader = DataLoaderBuilder::new(SampleBatcher::<B>::new(self.device.clone()))
            .batch_size(self.config.batch_size)
            .num_workers(self.config.num_workers)
            .build(dataset);

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; total];
        let mut progress = ProgressLogger::new(operation, total);

        for batch in loader.iter() {
            let scores = model.predict(batch.images);
            let [rows, num_classes] = scores.dims();
            if rows != batch.positions.len() {
                return Err(SubmissionError::Inference(format!(
                    "Classifier returned {} rows for a batch of {}",
                    rows,
                    batch.positions.len()
                )));
            }

            let values: Vec<f32> = scores
                .into_data()
                .to_vec()
                .map_err(|e| SubmissionError::Inference(format!("{:?}", e)))?;

            for (position, row) in batch.positions.iter().zip(values.chunks(num_classes.max(1))) {
                let slot = slots.get_mut(*position).ok_or_else(|| {
                    SubmissionError::Inference(format!("Position {} out of range", position))
                })?;
                if slot.is_some() {
                    return Err(SubmissionError::Inference(format!(
                        "Sample {} scored twice",
                        position
                    )));
                }
                *slot = Some(row.to_vec());
            }

            progress.advance(batch.positions.len());
        }
        progress.finish();

        let scored = slots.iter().filter(|s| s.is_some()).count();
        debug!("{}: scored {}/{} samples", operation, scored, total);

        slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| {
                    SubmissionError::Inference(format!(
                        "{}: sample {} ({:?}) produced no prediction ({} of {} scored)",
                        operation,
                        position,
                        paths.get(position),
                        scored,
                        total
                    ))
                })
            })
            .collect()
    }
}
