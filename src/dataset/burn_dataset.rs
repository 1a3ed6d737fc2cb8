//! Burn Dataset Integration
//!
//! Implements Burn's `Dataset` and `Batcher` traits so partitions can be fed
//! through a multi-worker `DataLoader`. Every item remembers its position in
//! the partition; workers may deliver batches out of order and the inference
//! engine uses these positions to restore the input order.

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::indexer::{LabeledSample, TestSample};
use super::transform::{ImageTensor, Preprocessor};
use crate::utils::error::Result;

/// One preprocessed sample ready for batching
#[derive(Clone, Debug)]
pub struct SampleItem {
    /// Position of the sample in its partition
    pub position: usize,
    pub image: ImageTensor,
    /// Ground truth, present for labeled samples only
    pub label: Option<usize>,
}

/// A partition of samples, loaded and preprocessed lazily
#[derive(Debug, Clone)]
pub struct SampleDataset {
    entries: Vec<(PathBuf, Option<usize>)>,
    preprocessor: Preprocessor,
    /// Base seed for the per-sample crop RNG
    seed: u64,
}

impl SampleDataset {
    pub fn new(entries: Vec<(PathBuf, Option<usize>)>, preprocessor: Preprocessor, seed: u64) -> Self {
        Self {
            entries,
            preprocessor,
            seed,
        }
    }

    pub fn from_labeled(samples: &[LabeledSample], preprocessor: Preprocessor, seed: u64) -> Self {
        let entries = samples
            .iter()
            .map(|s| (s.path.clone(), Some(s.label)))
            .collect();
        Self::new(entries, preprocessor, seed)
    }

    pub fn from_test(samples: &[TestSample], preprocessor: Preprocessor, seed: u64) -> Self {
        let entries = samples.iter().map(|s| (s.path.clone(), None)).collect();
        Self::new(entries, preprocessor, seed)
    }

    /// Load and preprocess the sample at `index`.
    ///
    /// Each index draws from its own ChaCha stream, so crops do not depend
    /// on which worker thread handles the sample.
    pub fn sample(&self, index: usize) -> Option<Result<SampleItem>> {
        let (path, label) = self.entries.get(index)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64);

        Some(
            self.preprocessor
                .load_and_apply(path, &mut rng)
                .map(|image| SampleItem {
                    position: index,
                    image,
                    label: *label,
                }),
        )
    }

    pub fn path(&self, index: usize) -> Option<&PathBuf> {
        self.entries.get(index).map(|(path, _)| path)
    }
}

impl Dataset<SampleItem> for SampleDataset {
    fn get(&self, index: usize) -> Option<SampleItem> {
        match self.sample(index)? {
            Ok(item) => Some(item),
            Err(e) => {
                // The engine turns the missing item into a hard error
                tracing::error!("Failed to prepare sample {}: {}", index, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A batch of images with the partition positions they came from
#[derive(Clone, Debug)]
pub struct SampleBatch<B: Backend> {
    /// Shape `[batch_size, channels, height, width]`
    pub images: Tensor<B, 4>,
    pub positions: Vec<usize>,
}

/// Stacks preprocessed items into a 4D tensor
#[derive(Clone, Debug)]
pub struct SampleBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SampleBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SampleItem, SampleBatch<B>> for SampleBatcher<B> {
    fn batch(&self, items: Vec<SampleItem>) -> SampleBatch<B> {
        let batch_size = items.len();
        // Items of one batch share a shape; the engine runs with batch size 1
        let [channels, height, width] = items[0].image.shape;

        let images_data: Vec<f32> = items
            .iter()
            .flat_map(|item| item.image.data.iter().copied())
            .collect();

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            &self.device,
        );

        SampleBatch {
            images,
            positions: items.iter().map(|item| item.position).collect(),
        }
    }
}
