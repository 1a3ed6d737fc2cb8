//! Submission Pipeline
//!
//! Wires the stages together:
//!
//! 1. check that the weight artifact exists (before any other work)
//! 2. index labeled samples and split them into train/validation
//! 3. load the classifier
//! 4. score the validation partition and compute the F-score
//! 5. score the test samples
//! 6. write the submission named after the validation score

use std::path::PathBuf;
use std::time::Instant;

use burn::tensor::backend::Backend;
use tracing::{debug, info};

use crate::config::SubmissionConfig;
use crate::dataset::burn_dataset::SampleDataset;
use crate::dataset::indexer::{DatasetStats, SampleIndexer};
use crate::dataset::split::DatasetSplits;
use crate::dataset::transform::Preprocessor;
use crate::inference::engine::InferenceEngine;
use crate::model::{resolve_weights, Classifier, ClassifierLoader};
use crate::submission::writer::SubmissionWriter;
use crate::utils::error::Result;
use crate::utils::metrics::{fscore, predicted_classes, Metrics};

/// Outcome of a submission run
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub submission_path: PathBuf,
    /// Macro F-score on the validation partition
    pub validation_score: f64,
    pub validation_metrics: Metrics,
    pub train_size: usize,
    pub validation_size: usize,
    pub test_size: usize,
    pub elapsed_secs: f64,
}

/// Produce a submission file for `config` using the classifier from `loader`
pub fn generate_submission<B, L>(
    config: &SubmissionConfig,
    loader: &L,
    device: &B::Device,
) -> Result<SubmissionReport>
where
    B: Backend,
    L: ClassifierLoader<B>,
{
    let start = Instant::now();
    config.validate()?;

    let weights = resolve_weights(&config.weights_path)?;
    info!("Using weights: {:?}", weights);

    let indexer = SampleIndexer::new(&config.data_dir, config.indexer.clone());
    let labeled = indexer.index_labeled()?;
    DatasetStats::from_samples(&labeled).log();

    info!(
        "Splitting with validation fraction {} (seed {})",
        config.split.validation_fraction, config.split.seed
    );
    let splits = DatasetSplits::stratified(labeled, config.split.clone())?;
    for line in splits.stats().to_string().lines() {
        info!("{}", line);
    }

    let test_samples = indexer.index_test()?;

    let model = loader.load(&weights, device)?;
    let engine = InferenceEngine::<B>::new(config.inference.clone(), device.clone())?;

    // Validation
    let validation_dataset = SampleDataset::from_labeled(
        &splits.validation,
        Preprocessor::evaluation(&config.preprocess),
        config.split.seed,
    );
    let validation_scores = engine.predict(&model, validation_dataset, "Validation inference")?;

    let truth = splits.validation_labels();
    let validation_score = fscore(&validation_scores, &truth)?;
    let predicted = predicted_classes(&validation_scores)?;
    let num_classes = truth
        .iter()
        .chain(predicted.iter())
        .map(|&c| c + 1)
        .max()
        .unwrap_or(0)
        .max(model.num_classes());
    let validation_metrics = Metrics::from_predictions(&predicted, &truth, num_classes);
    debug!("{}", validation_metrics);
    info!("Validation F-score: {:.4}", validation_score);

    // Test
    let test_dataset =
        SampleDataset::from_test(&test_samples, Preprocessor::test(), config.split.seed);
    let test_scores = engine.predict(&model, test_dataset, "Test inference")?;
    let ids: Vec<i32> = test_samples.iter().map(|s| s.id).collect();

    let submission_path =
        SubmissionWriter::new(&config.output_dir).write(&test_scores, &ids, validation_score)?;

    Ok(SubmissionReport {
        submission_path,
        validation_score,
        validation_metrics,
        train_size: splits.train.len(),
        validation_size: splits.validation.len(),
        test_size: test_samples.len(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    use crate::utils::error::SubmissionError;

    type TestBackend = NdArray;

    /// Class 1 for bright images, class 0 for dark ones
    struct BrightnessClassifier;

    impl<B: Backend> Classifier<B> for BrightnessClassifier {
        fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
            let [n, c, h, w] = images.dims();
            let mean = images.reshape([n, c * h * w]).mean_dim(1);
            Tensor::cat(vec![mean.clone().neg().add_scalar(1.0), mean], 1)
        }

        fn num_classes(&self) -> usize {
            2
        }
    }

    struct BrightnessLoader;

    impl<B: Backend> ClassifierLoader<B> for BrightnessLoader {
        type Model = BrightnessClassifier;

        fn load(&self, _weights: &Path, _device: &B::Device) -> Result<Self::Model> {
            Ok(BrightnessClassifier)
        }
    }

    fn write_image(path: &Path, size: u32, value: u8) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(size, size, Rgb([value, value, value]))
            .save(path)
            .unwrap();
    }

    fn build_layout(root: &Path) {
        for sample in 0..5 {
            write_image(&root.join(format!("train/0/{}/radial_polar_area.png", sample)), 130, 20);
            write_image(&root.join(format!("train/1/{}/radial_polar_area.png", 10 + sample)), 130, 230);
        }
        write_image(&root.join("test/9/radial_polar_area.png"), 128, 240);
        write_image(&root.join("test/2/radial_polar_area.png"), 128, 10);
        write_image(&root.join("test/5/radial_polar_area.png"), 128, 250);
        std::fs::write(root.join("model.mpk"), b"weights").unwrap();
    }

    #[test]
    fn test_end_to_end_submission() {
        let temp = TempDir::new().unwrap();
        build_layout(temp.path());

        let config = SubmissionConfig::new(temp.path(), temp.path().join("model.mpk"))
            .with_output_dir(temp.path().join("submissions"));
        let report = generate_submission::<TestBackend, _>(
            &config,
            &BrightnessLoader,
            &Default::default(),
        )
        .unwrap();

        assert_eq!(report.validation_size, 3);
        assert_eq!(report.train_size, 7);
        assert_eq!(report.test_size, 3);
        assert!((report.validation_score - 1.0).abs() < 1e-9);

        let name = report.submission_path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_1.0000_submission.csv"), "{}", name);

        let contents = std::fs::read_to_string(&report.submission_path).unwrap();
        assert_eq!(contents, "id,label\n2,0\n5,1\n9,1\n");
    }

    #[test]
    fn test_missing_weights_fail_before_indexing() {
        let temp = TempDir::new().unwrap();
        let output_dir = temp.path().join("submissions");
        let config = SubmissionConfig::new(temp.path().join("no_data"), temp.path().join("nothing.mpk"))
            .with_output_dir(&output_dir);

        let err = generate_submission::<TestBackend, _>(&config, &BrightnessLoader, &Default::default())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::WeightsNotFound(_)));
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_singleton_class_aborts_run() {
        let temp = TempDir::new().unwrap();
        build_layout(temp.path());
        write_image(&temp.path().join("train/7/99/radial_polar_area.png"), 130, 100);

        let config = SubmissionConfig::new(temp.path(), temp.path().join("model"))
            .with_output_dir(temp.path().join("submissions"));
        let err = generate_submission::<TestBackend, _>(&config, &BrightnessLoader, &Default::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::StratificationInfeasible { label: 7, count: 1 }
        ));
    }
}
