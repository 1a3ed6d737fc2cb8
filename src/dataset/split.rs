//! Stratified train/validation split
//!
//! Labeled samples are partitioned so that every class keeps roughly the
//! same share of validation members as the dataset as a whole, and every
//! class appears in both partitions.
//!
//! The split is deterministic for a given seed: class members are shuffled
//! with a `ChaCha8Rng` and both partitions keep the discovery order of the
//! input.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::indexer::LabeledSample;
use crate::utils::error::{Result, SubmissionError};

/// Default share of labeled samples held out for validation
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.3;

/// Default seed for the split RNG
pub const DEFAULT_SEED: u64 = 42;

/// Configuration for dataset splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of labeled data assigned to validation
    pub validation_fraction: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl SplitConfig {
    pub fn new(validation_fraction: f64, seed: u64) -> Result<Self> {
        let config = Self {
            validation_fraction,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(SubmissionError::Config(format!(
                "Validation fraction must be strictly between 0.0 and 1.0, got {}",
                self.validation_fraction
            )));
        }
        Ok(())
    }
}

/// Train and validation partitions of the labeled samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSplits {
    pub train: Vec<LabeledSample>,
    pub validation: Vec<LabeledSample>,
    /// Configuration used to create these splits
    pub config: SplitConfig,
}

impl DatasetSplits {
    /// Split `samples` into train and validation, stratified by label.
    ///
    /// Fails when the input is empty or when any class has fewer than two
    /// members, since such a class cannot appear in both partitions.
    pub fn stratified(samples: Vec<LabeledSample>, config: SplitConfig) -> Result<Self> {
        config.validate()?;

        if samples.is_empty() {
            return Err(SubmissionError::Dataset(
                "No labeled samples provided for splitting".to_string(),
            ));
        }

        // Group sample positions by class
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, sample) in samples.iter().enumerate() {
            by_class.entry(sample.label).or_default().push(idx);
        }

        if let Some((&label, members)) = by_class.iter().find(|(_, members)| members.len() < 2) {
            return Err(SubmissionError::StratificationInfeasible {
                label,
                count: members.len(),
            });
        }

        let class_sizes: Vec<(usize, usize)> = by_class
            .iter()
            .map(|(&label, members)| (label, members.len()))
            .collect();
        let allocation =
            allocate_validation(&class_sizes, samples.len(), config.validation_fraction);

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut in_validation = vec![false; samples.len()];

        for (members, &n_val) in by_class.values_mut().zip(allocation.iter()) {
            members.shuffle(&mut rng);
            for &idx in members.iter().take(n_val) {
                in_validation[idx] = true;
            }
        }

        let mut train = Vec::with_capacity(samples.len());
        let mut validation = Vec::new();
        for (sample, is_val) in samples.into_iter().zip(in_validation) {
            if is_val {
                validation.push(sample);
            } else {
                train.push(sample);
            }
        }

        Ok(Self {
            train,
            validation,
            config,
        })
    }

    /// Get statistics about the splits
    pub fn stats(&self) -> SplitStats {
        let mut per_class: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for sample in &self.train {
            per_class.entry(sample.label).or_default().0 += 1;
        }
        for sample in &self.validation {
            per_class.entry(sample.label).or_default().1 += 1;
        }

        SplitStats {
            total_samples: self.train.len() + self.validation.len(),
            train_size: self.train.len(),
            validation_size: self.validation.len(),
            num_classes: per_class.len(),
            validation_ratio_per_class: per_class
                .into_iter()
                .map(|(label, (train, val))| (label, val as f64 / (train + val) as f64))
                .collect(),
        }
    }

    /// Labels of the validation partition, in partition order
    pub fn validation_labels(&self) -> Vec<usize> {
        self.validation.iter().map(|s| s.label).collect()
    }
}

/// Number of validation members per class, in the order of `class_sizes`.
///
/// The overall count is `ceil(fraction * total)`. It is spread by largest
/// remainder (ties to the larger class, then the lower label), and each class
/// is then clamped to `[1, size - 1]`.
fn allocate_validation(class_sizes: &[(usize, usize)], total: usize, fraction: f64) -> Vec<usize> {
    // Guard against 0.3 * 10 landing a hair above 3.0
    let n_val = ((fraction * total as f64) - 1e-9).ceil().max(0.0) as usize;

    let exact: Vec<f64> = class_sizes
        .iter()
        .map(|&(_, size)| n_val as f64 * size as f64 / total as f64)
        .collect();
    let mut allocation: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let assigned: usize = allocation.iter().sum();
    let mut order: Vec<usize> = (0..class_sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = exact[a] - exact[a].floor();
        let rem_b = exact[b] - exact[b].floor();
        rem_b
            .partial_cmp(&rem_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(class_sizes[b].1.cmp(&class_sizes[a].1))
            .then(class_sizes[a].0.cmp(&class_sizes[b].0))
    });
    for &i in order.iter().take(n_val.saturating_sub(assigned)) {
        allocation[i] += 1;
    }

    allocation
        .into_iter()
        .zip(class_sizes)
        .map(|(n, &(_, size))| n.clamp(1, size - 1))
        .collect()
}

/// Statistics about dataset splits
#[derive(Debug, Clone)]
pub struct SplitStats {
    pub total_samples: usize,
    pub train_size: usize,
    pub validation_size: usize,
    pub num_classes: usize,
    /// label -> share of that class assigned to validation
    pub validation_ratio_per_class: BTreeMap<usize, f64>,
}

impl std::fmt::Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total_samples.max(1) as f64;
        writeln!(f, "Dataset Split Statistics:")?;
        writeln!(f, "  Total samples: {}", self.total_samples)?;
        writeln!(f, "  Number of classes: {}", self.num_classes)?;
        writeln!(f, "  Train: {} ({:.1}%)", self.train_size,
            100.0 * self.train_size as f64 / total)?;
        write!(f, "  Validation: {} ({:.1}%)", self.validation_size,
            100.0 * self.validation_size as f64 / total)
    }
}
