//! Submission generator CLI
//!
//! Scores a validation split and the test set with a pretrained classifier
//! and writes `<timestamp>_<score>_submission.csv`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use usg_submission::backend::{DefaultBackend, Runtime};
use usg_submission::config::{SubmissionConfig, DEFAULT_OUTPUT_DIR};
use usg_submission::dataset::split::{SplitConfig, DEFAULT_SEED, DEFAULT_VALIDATION_FRACTION};
use usg_submission::model::{CompactRecorderLoader, UsgClassifierConfig};
use usg_submission::pipeline::{generate_submission, SubmissionReport};
use usg_submission::utils::format_duration;
use usg_submission::utils::logging::{init_logging, LogConfig};

/// Generate a competition submission from a pretrained model
#[derive(Parser, Debug)]
#[command(name = "generate_submission")]
#[command(version)]
#[command(about = "Score validation and test samples and write a submission CSV", long_about = None)]
struct Cli {
    /// Folder with 'train' and 'test' folders prepared for the competition
    data_folder: PathBuf,

    /// Weight artifact of the model to use for prediction
    model_folder: PathBuf,

    /// Directory for submission files
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Random seed for the split and the validation crops
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Fraction of labeled samples held out for validation
    #[arg(long, default_value_t = DEFAULT_VALIDATION_FRACTION)]
    validation_fraction: f64,

    /// Number of classes when the checkpoint has no config sidecar
    #[arg(long)]
    num_classes: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    let runtime = Runtime::init();

    let split = SplitConfig::new(cli.validation_fraction, cli.seed)
        .context("Invalid split settings")?;
    let config = SubmissionConfig::new(&cli.data_folder, &cli.model_folder)
        .with_output_dir(&cli.output_dir)
        .with_split(split);

    let mut model_config = UsgClassifierConfig::new();
    if let Some(num_classes) = cli.num_classes {
        model_config.num_classes = num_classes;
    }
    let loader = CompactRecorderLoader::new(model_config);

    println!("{}", "Submission Configuration:".cyan().bold());
    println!("  Data:     {:?}", config.data_dir);
    println!("  Weights:  {:?}", config.weights_path);
    println!("  Output:   {:?}", config.output_dir);
    println!("  Backend:  {}", runtime.backend_name());
    println!("  Seed:     {}", config.split.seed);
    println!();

    info!("Generating submission");
    let report = generate_submission::<DefaultBackend, _>(&config, &loader, runtime.device())
        .with_context(|| {
            format!(
                "Failed to generate submission from {:?} with {:?}",
                config.data_dir, config.weights_path
            )
        })?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &SubmissionReport) {
    println!();
    println!("{}", "Submission Summary:".green().bold());
    println!(
        "  Split:            {} train / {} validation",
        report.train_size, report.validation_size
    );
    println!("  Test samples:     {}", report.test_size);
    println!(
        "  Validation F1:    {}",
        format!("{:.4}", report.validation_score).yellow().bold()
    );
    println!(
        "  Accuracy:         {:.2}%",
        report.validation_metrics.accuracy * 100.0
    );
    println!("  Elapsed:          {}", format_duration(report.elapsed_secs));
    println!("  File:             {}", report.submission_path.display());
}
