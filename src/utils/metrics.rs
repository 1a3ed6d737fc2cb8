//! Metrics Module for Validation Scoring
//!
//! Converts per-class score vectors into predicted classes and computes the
//! F-score that is embedded in the submission file name:
//! - Argmax with lowest-index tie breaking
//! - Precision, Recall, F1-score per class
//! - Confusion Matrix

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, SubmissionError};

/// Index of the largest score. Ties go to the lowest index and NaN never wins.
///
/// Returns `None` for an empty slice or a slice made only of NaN.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (idx, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }

    best.map(|(idx, _)| idx)
}

/// Predicted class for every score vector, in order
pub fn predicted_classes(scores: &[Vec<f32>]) -> Result<Vec<usize>> {
    scores
        .iter()
        .enumerate()
        .map(|(i, row)| {
            argmax(row).ok_or_else(|| {
                SubmissionError::Inference(format!("score vector {} has no finite maximum", i))
            })
        })
        .collect()
}

/// Macro-averaged F1 of `predictions` (score vectors) against `ground_truth`.
///
/// Classes that appear in neither predictions nor ground truth do not count
/// towards the average. The result lies in `[0, 1]`.
pub fn fscore(predictions: &[Vec<f32>], ground_truth: &[usize]) -> Result<f64> {
    if predictions.len() != ground_truth.len() {
        return Err(SubmissionError::Inference(format!(
            "{} predictions for {} ground truth labels",
            predictions.len(),
            ground_truth.len()
        )));
    }
    if predictions.is_empty() {
        return Err(SubmissionError::Dataset(
            "cannot score an empty validation set".to_string(),
        ));
    }

    let predicted = predicted_classes(predictions)?;
    let num_classes = predicted
        .iter()
        .chain(ground_truth.iter())
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);

    Ok(Metrics::from_predictions(&predicted, ground_truth, num_classes).macro_f1)
}

/// Summary metrics for a set of predictions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_samples: usize,
    pub correct_predictions: usize,
    /// Overall accuracy (correct / total)
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    /// Mean F1 over classes seen in predictions or ground truth
    pub macro_f1: f64,
    /// F1 weighted by class support
    pub weighted_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

impl Metrics {
    /// Create new metrics from predicted classes and ground truth labels
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let total_samples = predictions.len().min(ground_truth.len());
        if total_samples == 0 {
            return Self::default();
        }

        let confusion_matrix =
            ConfusionMatrix::from_predictions(predictions, ground_truth, num_classes);
        let correct_predictions = confusion_matrix.correct();
        let accuracy = correct_predictions as f64 / total_samples as f64;

        let per_class: Vec<ClassMetrics> = (0..num_classes)
            .map(|class_idx| ClassMetrics::from_confusion_matrix(&confusion_matrix, class_idx))
            .collect();

        // A class is "seen" if it was either predicted or present in the labels
        let seen: Vec<&ClassMetrics> = per_class
            .iter()
            .filter(|m| m.support > 0 || m.true_positives + m.false_positives > 0)
            .collect();
        let num_seen = seen.len() as f64;

        let mean = |f: fn(&ClassMetrics) -> f64| {
            if num_seen > 0.0 {
                seen.iter().map(|m| f(m)).sum::<f64>() / num_seen
            } else {
                0.0
            }
        };

        let macro_precision = mean(|m| m.precision);
        let macro_recall = mean(|m| m.recall);
        let macro_f1 = mean(|m| m.f1);

        let total_support: usize = per_class.iter().map(|m| m.support).sum();
        let weighted_f1 = if total_support > 0 {
            per_class
                .iter()
                .map(|m| m.f1 * m.support as f64)
                .sum::<f64>()
                / total_support as f64
        } else {
            0.0
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy,
            macro_precision,
            macro_recall,
            macro_f1,
            weighted_f1,
            per_class,
            confusion_matrix,
        }
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Validation Metrics:")?;
        writeln!(f, "  Samples:          {}", self.total_samples)?;
        writeln!(f, "  Accuracy:         {:6.2}%", self.accuracy * 100.0)?;
        writeln!(f, "  Macro Precision:  {:6.2}%", self.macro_precision * 100.0)?;
        writeln!(f, "  Macro Recall:     {:6.2}%", self.macro_recall * 100.0)?;
        writeln!(f, "  Macro F1:         {:6.2}%", self.macro_f1 * 100.0)?;
        write!(f, "  Weighted F1:      {:6.2}%", self.weighted_f1 * 100.0)
    }
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_idx: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Precision = TP / (TP + FP)
    pub precision: f64,
    /// Recall = TP / (TP + FN)
    pub recall: f64,
    /// F1 = 2 * (precision * recall) / (precision + recall)
    pub f1: f64,
    /// Number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        // Predicted as this class but actually another
        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        // Actually this class but predicted as another
        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let support = true_positives + false_negatives;

        let precision = if true_positives + false_positives > 0 {
            true_positives as f64 / (true_positives + false_positives) as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            true_positives as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Confusion Matrix for multi-class classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    /// Row = actual, column = predicted, row-major
    pub matrix: Vec<usize>,
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);

        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }

        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    /// Get the total count
    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(class: usize, num_classes: usize) -> Vec<f32> {
        let mut v = vec![0.0; num_classes];
        v[class] = 1.0;
        v
    }

    #[test]
    fn test_argmax_unique_maximum() {
        let scores = [0.1, 0.7, 0.2];
        assert_eq!(argmax(&scores), Some(1));
        // Stable across calls
        assert_eq!(argmax(&scores), argmax(&scores));
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.5, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(argmax(&[2.0, 2.0]), Some(0));
    }

    #[test]
    fn test_argmax_skips_nan_and_handles_empty() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f32::NAN]), None);
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
    }

    #[test]
    fn test_fscore_perfect() {
        let truth = vec![0, 1, 2, 1];
        let preds: Vec<Vec<f32>> = truth.iter().map(|&c| one_hot(c, 3)).collect();
        let f = fscore(&preds, &truth).unwrap();
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fscore_macro_average() {
        // truth: 0 0 1 1, predicted: 0 1 1 1
        // class 0: P=1, R=0.5, F1=2/3 ; class 1: P=2/3, R=1, F1=0.8
        let truth = vec![0, 0, 1, 1];
        let preds = vec![one_hot(0, 2), one_hot(1, 2), one_hot(1, 2), one_hot(1, 2)];
        let f = fscore(&preds, &truth).unwrap();
        let expected = (2.0 / 3.0 + 0.8) / 2.0;
        assert!((f - expected).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&f));
    }

    #[test]
    fn test_fscore_rejects_length_mismatch_and_empty() {
        assert!(fscore(&[one_hot(0, 2)], &[0, 1]).is_err());
        assert!(fscore(&[], &[]).is_err());
    }

    #[test]
    fn test_confusion_matrix() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 1, 2], &[0, 1, 2, 2], 3);
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.correct(), 3);
        assert_eq!(cm.get(2, 1), 1);
    }

    #[test]
    fn test_metrics_accuracy() {
        let metrics = Metrics::from_predictions(&[0, 1, 1, 2], &[0, 1, 2, 2], 3);
        assert_eq!(metrics.correct_predictions, 3);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(metrics.per_class[2].support, 2);
    }
}
