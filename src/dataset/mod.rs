//! Dataset module for sample discovery, splitting, and preprocessing
//!
//! This module provides:
//! - Discovery of labeled and test samples from the on-disk layout
//! - Stratified train/validation splitting
//! - Image preprocessing (random crop, Lanczos resize, tensor conversion)
//! - Burn `Dataset` and `Batcher` implementations for the data loader

pub mod burn_dataset;
pub mod indexer;
pub mod split;
pub mod transform;

// Re-export main types for convenience
pub use burn_dataset::{SampleBatch, SampleBatcher, SampleDataset, SampleItem};
pub use indexer::{DatasetStats, IndexerConfig, LabeledSample, SampleIndexer, TestSample};
pub use split::{DatasetSplits, SplitConfig, SplitStats};
pub use transform::{ImageTensor, PreprocessConfig, Preprocessor, Transform};
