//! Sample Indexer
//!
//! The only place that knows how samples are laid out on disk. Everything
//! downstream works with [`LabeledSample`] and [`TestSample`] records.
//!
//! ```text
//! data_folder/
//! ├── train/
//! │   └── <class_id>/<sample_id>/radial_polar_area.png
//! └── test/
//!     └── <sample_id>/radial_polar_area.png
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Result, SubmissionError};

/// File name every sample artifact carries
pub const SAMPLE_FILE_NAME: &str = "radial_polar_area.png";

/// Subtree holding labeled samples
pub const TRAIN_DIR: &str = "train";

/// Subtree holding unlabeled samples
pub const TEST_DIR: &str = "test";

/// A training sample whose class comes from its grandparent directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub path: PathBuf,
    pub label: usize,
}

/// A test sample whose id comes from its parent directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSample {
    pub path: PathBuf,
    pub id: i32,
}

/// Indexer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Artifact file name to look for
    pub file_name: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            file_name: SAMPLE_FILE_NAME.to_string(),
        }
    }
}

/// Discovers samples under a data folder
#[derive(Debug, Clone)]
pub struct SampleIndexer {
    root_dir: PathBuf,
    config: IndexerConfig,
}

impl SampleIndexer {
    pub fn new<P: AsRef<Path>>(root_dir: P, config: IndexerConfig) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            config,
        }
    }

    /// All labeled samples under `train/`, in sorted walk order
    pub fn index_labeled(&self) -> Result<Vec<LabeledSample>> {
        let train_dir = self.root_dir.join(TRAIN_DIR);
        info!("Indexing labeled samples in: {:?}", train_dir);

        let samples = self
            .find_artifacts(&train_dir)?
            .into_iter()
            .map(|path| {
                let label = numeric_ancestor::<usize>(&path, 2)?;
                Ok(LabeledSample { path, label })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Found {} labeled samples", samples.len());
        Ok(samples)
    }

    /// All unlabeled samples under `test/`, in sorted walk order
    pub fn index_test(&self) -> Result<Vec<TestSample>> {
        let test_dir = self.root_dir.join(TEST_DIR);
        info!("Indexing test samples in: {:?}", test_dir);

        let samples = self
            .find_artifacts(&test_dir)?
            .into_iter()
            .map(|path| {
                let id = numeric_ancestor::<i32>(&path, 1)?;
                Ok(TestSample { path, id })
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Found {} test samples", samples.len());
        Ok(samples)
    }

    fn find_artifacts(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(SubmissionError::layout(dir, "directory does not exist"));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                SubmissionError::layout(path, e.to_string())
            })?;

            // `Path::is_file` follows symlinks, so linked artifacts are kept
            if entry.file_name().to_str() == Some(self.config.file_name.as_str())
                && entry.path().is_file()
            {
                paths.push(entry.into_path());
            }
        }

        debug!("{} artifacts named '{}' under {:?}", paths.len(), self.config.file_name, dir);
        Ok(paths)
    }
}

/// Parse the name of the `depth`-th ancestor directory of `path` as a number
fn numeric_ancestor<T: std::str::FromStr>(path: &Path, depth: usize) -> Result<T> {
    let name = path
        .ancestors()
        .nth(depth)
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .ok_or_else(|| SubmissionError::layout(path, format!("no ancestor at depth {}", depth)))?;

    name.parse::<T>().map_err(|_| {
        SubmissionError::layout(path, format!("directory name '{}' is not an integer", name))
    })
}

/// Per-class sample counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    /// label -> count, ordered by label
    pub class_counts: BTreeMap<usize, usize>,
}

impl DatasetStats {
    pub fn from_samples(samples: &[LabeledSample]) -> Self {
        let mut class_counts = BTreeMap::new();
        for sample in samples {
            *class_counts.entry(sample.label).or_insert(0) += 1;
        }

        Self {
            total_samples: samples.len(),
            class_counts,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_counts.len()
    }

    /// Emit one debug line per class
    pub fn log(&self) {
        info!(
            "Dataset: {} samples across {} classes",
            self.total_samples,
            self.num_classes()
        );
        for (label, count) in &self.class_counts {
            let pct = 100.0 * *count as f64 / self.total_samples.max(1) as f64;
            debug!("  class {:>3}: {:>6} ({:>5.1}%)", label, count, pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"png").unwrap();
    }

    #[test]
    fn test_index_labeled_reads_grandparent() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("train/1/17/radial_polar_area.png"));
        touch(&temp.path().join("train/0/3/radial_polar_area.png"));
        touch(&temp.path().join("train/0/4/radial_polar_area.png"));
        touch(&temp.path().join("train/0/4/other.png"));

        let indexer = SampleIndexer::new(temp.path(), IndexerConfig::default());
        let samples = indexer.index_labeled().unwrap();

        assert_eq!(samples.len(), 3);
        let labels: Vec<usize> = samples.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![0, 0, 1]);
        assert!(samples[2].path.ends_with("1/17/radial_polar_area.png"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_artifacts_are_indexed() {
        use std::os::unix::fs::symlink;

        let temp = TempDir::new().unwrap();
        let store = temp.path().join("store");
        touch(&store.join("a.png"));
        touch(&store.join("b.png"));
        touch(&store.join("c.png"));

        for (target, link) in [
            ("a.png", "train/0/1/radial_polar_area.png"),
            ("b.png", "train/0/2/radial_polar_area.png"),
            ("c.png", "test/7/radial_polar_area.png"),
        ] {
            let link = temp.path().join(link);
            fs::create_dir_all(link.parent().unwrap()).unwrap();
            symlink(store.join(target), &link).unwrap();
        }
        // A dangling link is not a sample
        fs::create_dir_all(temp.path().join("test/8")).unwrap();
        symlink(store.join("gone.png"), temp.path().join("test/8/radial_polar_area.png")).unwrap();

        let indexer = SampleIndexer::new(temp.path(), IndexerConfig::default());
        let labeled = indexer.index_labeled().unwrap();
        let test = indexer.index_test().unwrap();

        assert_eq!(labeled.len(), 2);
        assert!(labeled.iter().all(|s| s.label == 0));
        assert_eq!(test.iter().map(|s| s.id).collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_index_test_reads_parent() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("test/12/radial_polar_area.png"));
        touch(&temp.path().join("test/5/radial_polar_area.png"));

        let indexer = SampleIndexer::new(temp.path(), IndexerConfig::default());
        let mut ids: Vec<i32> = indexer.index_test().unwrap().iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec![5, 12]);
    }

    #[test]
    fn test_non_numeric_directory_is_layout_error() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("train/cats/1/radial_polar_area.png"));

        let indexer = SampleIndexer::new(temp.path(), IndexerConfig::default());
        let err = indexer.index_labeled().unwrap_err();
        assert!(matches!(err, SubmissionError::Layout { .. }));
        assert!(err.to_string().contains("cats"));
    }

    #[test]
    fn test_missing_subtree_is_layout_error() {
        let temp = TempDir::new().unwrap();
        let indexer = SampleIndexer::new(temp.path(), IndexerConfig::default());
        assert!(matches!(
            indexer.index_test(),
            Err(SubmissionError::Layout { .. })
        ));
    }

    #[test]
    fn test_dataset_stats() {
        let samples: Vec<LabeledSample> = [0, 0, 1, 2, 2, 2]
            .iter()
            .map(|&label| LabeledSample {
                path: PathBuf::from("x.png"),
                label,
            })
            .collect();

        let stats = DatasetStats::from_samples(&samples);
        assert_eq!(stats.total_samples, 6);
        assert_eq!(stats.num_classes(), 3);
        assert_eq!(stats.class_counts[&2], 3);
    }
}
