//! # USG Submission
//!
//! Generates competition submissions from a pretrained image classifier
//! using the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: sample discovery, stratified splitting, preprocessing and Burn data loading
//! - `model`: classifier traits and the bundled CNN with its checkpoint loader
//! - `inference`: batched, order-preserving inference
//! - `submission`: CSV rows and timestamped submission files
//! - `pipeline`: the end-to-end run
//! - `utils`: errors, logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use usg_submission::backend::{DefaultBackend, Runtime};
//! use usg_submission::config::SubmissionConfig;
//! use usg_submission::model::CompactRecorderLoader;
//! use usg_submission::pipeline::generate_submission;
//!
//! let runtime = Runtime::init();
//! let config = SubmissionConfig::new("data", "models/best.mpk");
//! let report = generate_submission::<DefaultBackend, _>(&config, &CompactRecorderLoader::default(), runtime.device())?;
//! println!("{:?}", report.submission_path);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod submission;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::SubmissionConfig;
pub use dataset::split::{DatasetSplits, SplitConfig};
pub use dataset::{LabeledSample, SampleIndexer, TestSample};
pub use inference::{InferenceConfig, InferenceEngine};
pub use model::{Classifier, ClassifierLoader, CompactRecorderLoader, UsgClassifier};
pub use pipeline::{generate_submission, SubmissionReport};
pub use submission::{SubmissionRow, SubmissionWriter};
pub use utils::error::{Result, SubmissionError};
pub use utils::metrics::{fscore, ConfusionMatrix, Metrics};
