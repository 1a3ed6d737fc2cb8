//! Inference module for batched model prediction
//!
//! This module provides:
//! - Data loader configuration for inference (batch size, workers)
//! - An engine that scores a dataset and keeps predictions in input order

pub mod engine;

// Re-export main types for convenience
pub use engine::{InferenceConfig, InferenceEngine};
