//! Error Handling Module
//!
//! Defines the error type shared by every stage of the submission pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for submission generation
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// The pretrained weight artifact does not exist
    #[error("Weight artifact not found: {0}")]
    WeightsNotFound(PathBuf),

    /// The on-disk layout does not match `<root>/train/<class>/<sample>/<file>`
    #[error("Malformed data layout at '{path}': {reason}")]
    Layout { path: PathBuf, reason: String },

    /// A class has too few members to appear in both partitions
    #[error("Cannot stratify class {label}: {count} sample(s), need at least 2")]
    StratificationInfeasible { label: usize, count: usize },

    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error with model construction or weight loading
    #[error("Model error: {0}")]
    Model(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Two test samples share an id
    #[error("Duplicate submission id: {0}")]
    DuplicateId(i32),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience Result type for submission operations
pub type Result<T> = std::result::Result<T, SubmissionError>;

impl SubmissionError {
    /// Build a layout error for `path`
    pub fn layout(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Layout {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
